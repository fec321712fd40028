//! # Reaper
//! src/server/reaper.rs
//!
//! Recolecta workers terminados para que no queden entradas sin cosechar.
//!
//! - Modo `thread`: un thread supervisor recibe por un canal los handles de
//!   los workers (`Spawned`) y el aviso de que terminaron (`Exited`), y hace
//!   `join` de cada uno.
//! - Modo `fork`: un handler de SIGCHLD que drena `waitpid(-1, WNOHANG)`.

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Identificador de un worker (thread)
pub type WorkerId = u64;

enum Event {
    Spawned(WorkerId, JoinHandle<()>),
    Exited(WorkerId),
    /// El worker nunca llegó a lanzarse
    Abandoned(WorkerId),
}

/// Supervisor que cosecha los threads worker
pub struct Reaper {
    tx: Sender<Event>,
    unreaped: Arc<AtomicUsize>,
    supervisor: JoinHandle<()>,
}

impl Reaper {
    /// Arranca el thread supervisor
    pub fn start() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let unreaped = Arc::new(AtomicUsize::new(0));

        let supervisor = thread::Builder::new().name("reaper".to_string()).spawn({
            let unreaped = Arc::clone(&unreaped);
            move || supervise(rx, unreaped)
        })?;

        Ok(Self {
            tx,
            unreaped,
            supervisor,
        })
    }

    /// Aviso que el worker debe llevar consigo; al soltarlo (también por
    /// panic) notifica al supervisor
    pub fn exit_signal(&self, id: WorkerId) -> ExitSignal {
        ExitSignal {
            id,
            tx: self.tx.clone(),
        }
    }

    /// Entrega el handle de un worker recién lanzado
    pub fn track(&self, id: WorkerId, handle: JoinHandle<()>) {
        self.unreaped.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Event::Spawned(id, handle)).is_err() {
            // Supervisor caído: el handle se suelta y el thread queda detached
            self.unreaped.fetch_sub(1, Ordering::SeqCst);
            error!("reaper: supervisor no disponible, worker {} sin cosechar", id);
        }
    }

    /// Descarta un worker cuyo thread no se pudo crear
    ///
    /// Su `ExitSignal` ya se soltó dentro de `spawn` y dejó un `Exited` sin
    /// `Spawned` que lo acompañe.
    pub fn abandon(&self, id: WorkerId) {
        let _ = self.tx.send(Event::Abandoned(id));
    }

    /// Workers lanzados cuyo `join` aún no se hizo
    pub fn unreaped(&self) -> usize {
        self.unreaped.load(Ordering::SeqCst)
    }

    /// Cierra el canal y espera a que el supervisor termine
    ///
    /// Bloquea hasta que todos los `ExitSignal` vivos se suelten.
    pub fn shutdown(self) {
        let Reaper { tx, supervisor, .. } = self;
        drop(tx);
        if supervisor.join().is_err() {
            error!("reaper: el supervisor terminó con panic");
        }
    }
}

/// Notificación de fin de un worker, enviada en `Drop`
pub struct ExitSignal {
    id: WorkerId,
    tx: Sender<Event>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.tx.send(Event::Exited(self.id));
    }
}

fn supervise(rx: Receiver<Event>, unreaped: Arc<AtomicUsize>) {
    let mut running: HashMap<WorkerId, JoinHandle<()>> = HashMap::new();
    // Exited que llegaron antes que su Spawned
    let mut early_exits: HashSet<WorkerId> = HashSet::new();

    for event in rx {
        match event {
            Event::Spawned(id, handle) => {
                if early_exits.remove(&id) {
                    reap(id, handle, &unreaped);
                } else {
                    running.insert(id, handle);
                }
            }
            Event::Exited(id) => match running.remove(&id) {
                // El ExitSignal se suelta al final del worker: el join es inmediato
                Some(handle) => reap(id, handle, &unreaped),
                None => {
                    early_exits.insert(id);
                }
            },
            Event::Abandoned(id) => {
                early_exits.remove(&id);
            }
        }

        // Cualquier otro que ya haya terminado
        let finished: Vec<WorkerId> = running
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        for id in finished {
            if let Some(handle) = running.remove(&id) {
                reap(id, handle, &unreaped);
            }
        }
    }

    for (id, handle) in running.drain() {
        reap(id, handle, &unreaped);
    }
}

fn reap(id: WorkerId, handle: JoinHandle<()>, unreaped: &AtomicUsize) {
    match handle.join() {
        Ok(()) => debug!("reaper: worker {} cosechado", id),
        Err(_) => error!("reaper: worker {} terminó con panic", id),
    }
    unreaped.fetch_sub(1, Ordering::SeqCst);
}

/// Instala el handler de SIGCHLD para el modo `fork`
///
/// Sin `SA_RESTART`: un `accept` bloqueado vuelve con EINTR y el listener
/// lo reintenta.
pub fn install_sigchld_handler() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigchld),
        SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGCHLD, &action) }?;
    Ok(())
}

extern "C" fn on_sigchld(_signal: libc::c_int) {
    // Contexto de señal: nada de logging ni allocs. El último waitpid deja
    // ECHILD en errno; se restaura el del código interrumpido.
    let saved = Errno::last_raw();
    reap_children();
    Errno::set_raw(saved);
}

/// Cosecha todos los hijos terminados sin bloquear; devuelve cuántos
///
/// Que no haya hijos (ECHILD) o que ninguno haya terminado cuenta como
/// "nada que cosechar".
pub fn reap_children() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => return reaped,
            Ok(_) => reaped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{fork, ForkResult};
    use std::time::{Duration, Instant};

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn spawn_worker(reaper: &Reaper, id: WorkerId, work: fn()) {
        let signal = reaper.exit_signal(id);
        let handle = thread::spawn(move || {
            let _signal = signal;
            work();
        });
        reaper.track(id, handle);
    }

    #[test]
    fn test_reaps_all_finished_workers() {
        let reaper = Reaper::start().unwrap();
        for id in 0..16 {
            spawn_worker(&reaper, id, || thread::sleep(Duration::from_millis(5)));
        }

        assert!(wait_until(|| reaper.unreaped() == 0));
        reaper.shutdown();
    }

    #[test]
    fn test_exit_before_track_is_reaped() {
        let reaper = Reaper::start().unwrap();
        let signal = reaper.exit_signal(7);
        let handle = thread::spawn(move || drop(signal));

        // El Exited ya está en el canal antes del Spawned
        thread::sleep(Duration::from_millis(20));
        reaper.track(7, handle);

        assert!(wait_until(|| reaper.unreaped() == 0));
        reaper.shutdown();
    }

    #[test]
    fn test_panicking_worker_is_reaped() {
        let reaper = Reaper::start().unwrap();
        spawn_worker(&reaper, 1, || panic!("worker failure"));
        spawn_worker(&reaper, 2, || {});

        assert!(wait_until(|| reaper.unreaped() == 0));
        reaper.shutdown();
    }

    #[test]
    fn test_abandoned_worker_leaves_no_stale_exit() {
        let reaper = Reaper::start().unwrap();

        // Worker 9 nunca se lanza: su ExitSignal se suelta sin track
        drop(reaper.exit_signal(9));
        reaper.abandon(9);

        // Un worker con el mismo id que sigue corriendo no debe cosecharse
        // de inmediato (el join bloquearía al supervisor)
        let (release, wait) = mpsc::channel::<()>();
        let signal = reaper.exit_signal(9);
        let blocked = thread::spawn(move || {
            let _signal = signal;
            let _ = wait.recv();
        });
        reaper.track(9, blocked);

        spawn_worker(&reaper, 10, || {});
        assert!(wait_until(|| reaper.unreaped() == 1));

        release.send(()).unwrap();
        assert!(wait_until(|| reaper.unreaped() == 0));
        reaper.shutdown();
    }

    #[test]
    fn test_sigchld_handler_preserves_errno() {
        Errno::set_raw(libc::EAGAIN);
        on_sigchld(libc::SIGCHLD);
        assert_eq!(Errno::last_raw(), libc::EAGAIN);
    }

    #[test]
    fn test_reap_children_collects_all() {
        for _ in 0..4 {
            match unsafe { fork() }.unwrap() {
                ForkResult::Child => unsafe { libc::_exit(0) },
                ForkResult::Parent { .. } => {}
            }
        }

        // Sin hijos pendientes: ECHILD, y reap_children no bloquea
        assert!(wait_until(|| {
            reap_children();
            waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) == Err(Errno::ECHILD)
        }));
        assert_eq!(reap_children(), 0);
    }
}
