use std::{sync::mpsc, thread};

/// Applies `work` to every job and returns the results in job order.
///
/// With more than one worker, jobs are dealt round-robin over one channel
/// per scoped thread and replies are collected from a shared channel. The
/// first failure in job order is returned after all replies are in.
pub(super) fn run<J, R, E, W>(jobs: Vec<J>, workers: usize, work: W) -> Result<Vec<R>, E>
where
    J: Send,
    R: Send,
    E: Send,
    W: Fn(J) -> Result<R, E> + Sync,
{
    let count = jobs.len();
    let workers = workers.min(count);
    if workers <= 1 {
        return jobs.into_iter().map(work).collect();
    }

    let replies = thread::scope(|scope| {
        let (reply_tx, reply_rx) = mpsc::channel();
        let mut senders = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (job_tx, job_rx) = mpsc::channel::<(usize, J)>();
            let reply_tx = reply_tx.clone();
            let work = &work;
            scope.spawn(move || {
                for (slot, job) in job_rx {
                    if reply_tx.send((slot, work(job))).is_err() {
                        break;
                    }
                }
            });
            senders.push(job_tx);
        }
        drop(reply_tx);

        for (slot, job) in jobs.into_iter().enumerate() {
            // Fails only if the worker panicked, which the scope re-raises.
            let _ = senders[slot % workers].send((slot, job));
        }
        drop(senders);

        let mut replies: Vec<Option<Result<R, E>>> = (0..count).map(|_| None).collect();
        for (slot, reply) in reply_rx {
            replies[slot] = Some(reply);
        }
        replies
    });

    replies.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_job_order() {
        let jobs: Vec<u32> = (0..17).collect();

        let results: Result<Vec<u32>, ()> = run(jobs, 4, |j| Ok(j * j));

        assert_eq!(results.unwrap(), (0..17).map(|j| j * j).collect::<Vec<_>>());
    }

    #[test]
    fn first_failure_in_job_order_wins() {
        let jobs: Vec<u32> = (0..10).collect();

        let results = run(jobs, 3, |j| if j % 4 == 3 { Err(j) } else { Ok(j) });

        assert_eq!(results, Err(3));
    }
}
