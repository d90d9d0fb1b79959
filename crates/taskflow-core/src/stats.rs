use crate::task::Task;

/// Counts shown on the dashboard statistics panel. Always computed over the
/// whole collection, never the filtered view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|task| task.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_task;

    #[test]
    fn counts_split_by_completion() {
        let tasks = vec![
            sample_task(1, "A", false),
            sample_task(2, "B", true),
            sample_task(3, "C", false),
        ];
        assert_eq!(
            TaskStats::from_tasks(&tasks),
            TaskStats {
                total: 3,
                active: 2,
                completed: 1
            }
        );
        assert_eq!(TaskStats::from_tasks(&[]), TaskStats::default());
    }
}
