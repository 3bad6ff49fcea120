//! Scheduler Adapter (C11): dispatches per-row jobs across a thread pool.
//!
//! `spec.md` treats the runtime's dispatcher as an external collaborator
//! reachable only through a `parallel_for(n_jobs, job_fn)` signature; this
//! module is the crate's own minimal implementation of that contract,
//! built directly on `std::thread::scope` rather than a dependency, since
//! neither the teacher nor the rest of the pack reaches for a thread-pool
//! crate for this.

/// Runs `job(row, thread_index)` for every `row` in `0..n_jobs`, split
/// round-robin across up to `thread_count` OS threads. `thread_count == 0`
/// or `1` runs everything on the calling thread.
pub fn parallel_for<F>(n_jobs: usize, thread_count: usize, job: F)
where
    F: Fn(usize, usize) + Sync,
{
    let threads = thread_count.max(1).min(n_jobs.max(1));
    if threads <= 1 {
        for row in 0..n_jobs {
            job(row, 0);
        }
        return;
    }

    std::thread::scope(|scope| {
        for t in 0..threads {
            let job = &job;
            scope.spawn(move || {
                let mut row = t;
                while row < n_jobs {
                    job(row, t);
                    row += threads;
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn visits_every_row_exactly_once() {
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        parallel_for(37, 4, |row, _thread| {
            seen.lock().unwrap().push(row);
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn single_thread_runs_in_submission_order() {
        let counter = AtomicUsize::new(0);
        let order: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        parallel_for(5, 1, |row, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            order.lock().unwrap().push(row);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(order.into_inner().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
