use chrono::{
  DateTime,
  Local,
  NaiveDateTime,
  Utc
};

/// Parses a timestamp as the todo API
/// emits it.
///
/// The server writes naive UTC values
/// (`2025-01-02T03:04:05.123456`); an
/// explicit offset is honored when
/// present.
pub fn parse_api_timestamp(
  raw: &str
) -> Result<DateTime<Utc>, chrono::ParseError>
{
  let raw = raw.trim();
  match DateTime::parse_from_rfc3339(raw)
  {
    | Ok(dt) => Ok(dt.with_timezone(&Utc)),
    | Err(rfc_err) => {
      NaiveDateTime::parse_from_str(
        raw,
        "%Y-%m-%dT%H:%M:%S%.f"
      )
      .or_else(|_| {
        NaiveDateTime::parse_from_str(
          raw,
          "%Y-%m-%d %H:%M:%S%.f"
        )
      })
      .map(|ndt| {
        DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)
      })
      .map_err(|_| rfc_err)
    }
  }
}

/// Short local rendering used by the
/// task table.
pub fn format_local_date(
  dt: &DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

#[cfg(test)]
mod tests {
  use chrono::{
    Datelike,
    Timelike
  };

  use super::*;

  #[test]
  fn naive_server_timestamps_are_utc() {
    let dt = parse_api_timestamp(
      "2025-03-04T05:06:07.891011"
    )
    .expect("parse naive");
    assert_eq!(dt.year(), 2025);
    assert_eq!(dt.hour(), 5);
    assert_eq!(
      dt.timestamp_subsec_micros(),
      891011
    );
  }

  #[test]
  fn offsets_are_normalized() {
    let dt = parse_api_timestamp(
      "2025-03-04T05:06:07+02:00"
    )
    .expect("parse offset");
    assert_eq!(dt.hour(), 3);
  }

  #[test]
  fn garbage_is_rejected() {
    assert!(
      parse_api_timestamp("yesterday")
        .is_err()
    );
  }

  #[test]
  fn space_separated_form_is_accepted() {
    let dt = parse_api_timestamp(
      "2025-03-04 05:06:07"
    )
    .expect("parse spaced");
    assert_eq!(dt.minute(), 6);
  }
}
