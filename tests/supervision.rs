//! End-to-end supervision against a scripted process table on a paused clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use pidvisor::{
    Config, Event, EventKind, ExitStatus, Notification, ProcessControl, Reaped, RuntimeError,
    SpawnError, Subscribe, Supervisor,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How a scripted service reacts to signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Behaviour {
    /// Exits on any signal.
    Cooperative,
    /// Ignores every signal.
    Unkillable,
    /// Process creation always fails.
    Broken,
    /// The program cannot be loaded.
    Unloadable,
    /// Already gone when signalled, with no exit notification.
    Vanished,
}

#[derive(Default)]
struct Table {
    next_pid: i32,
    spawns: Vec<(String, Pid, Instant)>,
    signals: Vec<(Pid, Signal, Instant)>,
    live: HashMap<Pid, String>,
}

struct Fake {
    table: Mutex<Table>,
    behaviour: HashMap<String, Behaviour>,
    tx: mpsc::Sender<Notification>,
}

impl Fake {
    fn new(tx: mpsc::Sender<Notification>, services: &[(&str, Behaviour)]) -> Arc<Self> {
        Arc::new(Self {
            table: Mutex::new(Table {
                next_pid: 100,
                ..Table::default()
            }),
            behaviour: services
                .iter()
                .map(|(c, b)| ((*c).to_string(), *b))
                .collect(),
            tx,
        })
    }

    fn spawns_of(&self, command: &str) -> Vec<(Pid, Instant)> {
        self.table
            .lock()
            .unwrap()
            .spawns
            .iter()
            .filter(|(c, _, _)| c == command)
            .map(|(_, p, at)| (*p, *at))
            .collect()
    }

    fn spawn_count(&self) -> usize {
        self.table.lock().unwrap().spawns.len()
    }

    fn signals(&self) -> Vec<(Pid, Signal, Instant)> {
        self.table.lock().unwrap().signals.clone()
    }

    /// Makes the current process of `command` exit with status 1.
    fn crash(&self, command: &str) -> Pid {
        let mut t = self.table.lock().unwrap();
        let pid = t
            .live
            .iter()
            .find(|(_, c)| c.as_str() == command)
            .map(|(p, _)| *p)
            .unwrap();
        t.live.remove(&pid);
        self.tx
            .try_send(Notification::ChildExited {
                pid,
                status: ExitStatus::Exited(1),
            })
            .unwrap();
        pid
    }
}

impl ProcessControl for Fake {
    fn spawn(&self, command: &str) -> Result<Pid, SpawnError> {
        match self.behaviour.get(command) {
            Some(Behaviour::Broken) => {
                return Err(SpawnError::Resources(std::io::Error::from_raw_os_error(
                    Errno::EAGAIN as i32,
                )));
            }
            Some(Behaviour::Unloadable) => {
                return Err(SpawnError::Exec(std::io::Error::from(
                    std::io::ErrorKind::NotFound,
                )));
            }
            _ => {}
        }
        let mut t = self.table.lock().unwrap();
        t.next_pid += 1;
        let pid = Pid::from_raw(t.next_pid);
        t.spawns.push((command.to_string(), pid, Instant::now()));
        t.live.insert(pid, command.to_string());
        Ok(pid)
    }

    fn signal(&self, pid: Pid, sig: Signal) -> Result<(), Errno> {
        let mut t = self.table.lock().unwrap();
        let Some(command) = t.live.get(&pid).cloned() else {
            return Err(Errno::ESRCH);
        };
        match self.behaviour.get(&command).copied() {
            Some(Behaviour::Vanished) => {
                t.live.remove(&pid);
                Err(Errno::ESRCH)
            }
            Some(Behaviour::Unkillable) => {
                t.signals.push((pid, sig, Instant::now()));
                Ok(())
            }
            _ => {
                t.signals.push((pid, sig, Instant::now()));
                t.live.remove(&pid);
                self.tx
                    .try_send(Notification::ChildExited {
                        pid,
                        status: ExitStatus::Signaled(sig),
                    })
                    .unwrap();
                Ok(())
            }
        }
    }

    fn reap(&self) -> Reaped {
        Reaped::Nothing
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
    fn count(&self, kind: EventKind) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.clone());
    }
}

struct Harness {
    fake: Arc<Fake>,
    events: Arc<Recorder>,
    tx: mpsc::Sender<Notification>,
    run: JoinHandle<Result<(), RuntimeError>>,
}

fn start(services: &[(&str, Behaviour)]) -> Harness {
    let (tx, rx) = mpsc::channel(64);
    let fake = Fake::new(tx.clone(), services);
    let events = Arc::new(Recorder::default());

    let sup = Supervisor::builder(Config::default())
        .with_processes(fake.clone())
        .with_subscribers(vec![events.clone() as Arc<dyn Subscribe>])
        .build(services.iter().map(|(c, _)| *c).collect::<Vec<_>>())
        .unwrap();

    Harness {
        fake,
        events,
        tx: tx.clone(),
        run: tokio::spawn(sup.run_with(rx)),
    }
}

impl Harness {
    async fn terminate(&self) {
        self.tx
            .send(Notification::TerminationRequested {
                signal: Signal::SIGTERM,
            })
            .await
            .unwrap();
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}

#[tokio::test(start_paused = true)]
async fn test_one_process_per_command() {
    let h = start(&[
        ("/srv/a", Behaviour::Cooperative),
        ("/srv/b", Behaviour::Cooperative),
        ("/srv/c", Behaviour::Cooperative),
    ]);
    settle().await;

    assert_eq!(h.fake.spawn_count(), 3);
    for cmd in ["/srv/a", "/srv/b", "/srv/c"] {
        assert_eq!(h.fake.spawns_of(cmd).len(), 1, "{cmd}");
    }

    h.terminate().await;
    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::ServiceStarted), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exited_service_restarts_with_new_pid() {
    let h = start(&[
        ("/srv/a", Behaviour::Cooperative),
        ("/srv/b", Behaviour::Cooperative),
    ]);
    settle().await;

    let crashed_at = Instant::now();
    let old = h.fake.crash("/srv/a");
    tokio::time::sleep(Duration::from_secs(5)).await;

    let spawns = h.fake.spawns_of("/srv/a");
    assert_eq!(spawns.len(), 2);
    let (new, at) = spawns[1];
    assert_ne!(new, old);
    assert!(at - crashed_at <= Config::default().poll_interval);

    // The sibling was left alone.
    assert_eq!(h.fake.spawns_of("/srv/b").len(), 1);

    h.terminate().await;
    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::ServiceExited), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_termination_is_idempotent() {
    let h = start(&[("/srv/a", Behaviour::Cooperative)]);
    settle().await;

    h.terminate().await;
    h.terminate().await;
    h.terminate().await;

    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::ShutdownRequested), 1);
    assert_eq!(h.events.count(EventKind::ShutdownInitiated), 1);
    assert_eq!(h.fake.signals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clean_shutdown_never_kills() {
    let h = start(&[
        ("/srv/a", Behaviour::Cooperative),
        ("/srv/b", Behaviour::Cooperative),
    ]);
    settle().await;

    let requested_at = Instant::now();
    h.terminate().await;
    let res = h.run.await.unwrap();

    assert!(res.is_ok());
    let signals = h.fake.signals();
    assert_eq!(signals.len(), 2);
    for (_, sig, at) in signals {
        assert_eq!(sig, Signal::SIGTERM);
        assert!(at - requested_at <= Config::default().kill_interval);
    }
    assert_eq!(h.events.count(EventKind::AllStopped), 1);
    assert_eq!(h.events.count(EventKind::ShutdownEscalated), 0);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_is_fatal() {
    let h = start(&[
        ("/srv/a", Behaviour::Cooperative),
        ("/srv/nofork", Behaviour::Broken),
    ]);

    let err = h.run.await.unwrap().unwrap_err();
    assert!(matches!(err, RuntimeError::Launch { ref command, .. } if command == "/srv/nofork"));
    assert_eq!(err.exit_code(), 4);
    assert_eq!(h.events.count(EventKind::LaunchFailed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unkillable_service_escalates_then_aborts() {
    let h = start(&[("/srv/stuck", Behaviour::Unkillable)]);
    settle().await;

    let requested_at = Instant::now();
    h.terminate().await;
    let err = h.run.await.unwrap().unwrap_err();

    assert_eq!(err.exit_code(), 5);
    match &err {
        RuntimeError::ShutdownAborted { deadline, stuck } => {
            assert_eq!(*deadline, Duration::from_secs(80));
            assert_eq!(stuck, &vec!["/srv/stuck".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let cfg = Config::default();
    let signals = h.fake.signals();
    assert_eq!(signals[0].1, Signal::SIGTERM);

    let first_kill = signals
        .iter()
        .position(|(_, sig, _)| *sig == Signal::SIGKILL)
        .unwrap();
    assert!(signals[..first_kill].iter().all(|(_, s, _)| *s == Signal::SIGTERM));
    assert!(signals[first_kill..].iter().all(|(_, s, _)| *s == Signal::SIGKILL));
    assert!(signals[first_kill].2 - requested_at > cfg.shutdown_timeout);
    assert!(signals.last().unwrap().2 - requested_at <= cfg.forceful_deadline() + cfg.kill_interval);

    assert_eq!(h.events.count(EventKind::ShutdownEscalated), 1);
    assert_eq!(h.events.count(EventKind::ShutdownAborted), 1);
    assert_eq!(h.events.count(EventKind::AllStopped), 0);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_service_counts_as_stopped() {
    let h = start(&[("/srv/ghost", Behaviour::Vanished)]);
    settle().await;

    h.terminate().await;
    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::ServiceAlreadyDown), 1);
    assert_eq!(h.events.count(EventKind::AllStopped), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_child_is_logged_only() {
    let h = start(&[("/srv/a", Behaviour::Cooperative)]);
    settle().await;

    h.tx
        .send(Notification::ChildExited {
            pid: Pid::from_raw(9999),
            status: ExitStatus::Exited(0),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.fake.spawn_count(), 1);

    h.terminate().await;
    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::UnknownChildExited), 1);
}

#[tokio::test(start_paused = true)]
async fn test_termination_during_settle_skips_launch() {
    let h = start(&[("/srv/a", Behaviour::Cooperative)]);
    h.terminate().await;

    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.fake.spawn_count(), 0);
    assert_eq!(h.events.count(EventKind::AllStopped), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_failure_is_fatal() {
    let h = start(&[("/srv/a", Behaviour::Cooperative)]);
    settle().await;

    h.tx
        .send(Notification::RearmFailed {
            signal: Signal::SIGCHLD,
        })
        .await
        .unwrap();

    let err = h.run.await.unwrap().unwrap_err();
    assert!(matches!(err, RuntimeError::NotifyRearm { signal: Signal::SIGCHLD }));
    assert_eq!(err.exit_code(), 126);
    assert_eq!(h.events.count(EventKind::NotifyRearmFailed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unloadable_program_is_retried() {
    let h = start(&[
        ("/srv/a", Behaviour::Cooperative),
        ("/srv/missing", Behaviour::Unloadable),
    ]);
    tokio::time::sleep(Duration::from_millis(4500)).await;

    assert!(!h.run.is_finished());
    assert!(h.events.count(EventKind::LoadFailed) >= 3);
    assert_eq!(h.fake.spawns_of("/srv/a").len(), 1);

    h.terminate().await;
    assert!(h.run.await.unwrap().is_ok());
    assert_eq!(h.events.count(EventKind::LaunchFailed), 0);
    assert_eq!(h.events.count(EventKind::AllStopped), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_is_logged_and_fatal() {
    let (process_tx, _process_rx) = mpsc::channel(64);
    let fake = Fake::new(process_tx, &[("/srv/a", Behaviour::Cooperative)]);
    let events = Arc::new(Recorder::default());
    let (tx, rx) = mpsc::channel(1);

    let sup = Supervisor::builder(Config::default())
        .with_processes(fake.clone())
        .with_subscribers(vec![events.clone() as Arc<dyn Subscribe>])
        .build(["/srv/a"])
        .unwrap();
    let run = tokio::spawn(sup.run_with(rx));

    settle().await;
    drop(tx);

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, RuntimeError::NotifyClosed));
    assert_eq!(err.exit_code(), 126);
    assert_eq!(events.count(EventKind::ServiceStarted), 1);
    assert_eq!(events.count(EventKind::NotifyClosed), 1);
}
