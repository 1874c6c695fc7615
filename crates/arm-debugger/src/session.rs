//! The debugger session state machine: owns at most one running emulator,
//! its breakpoints, and the worker thread that drives `run()` while the
//! controller thread stays free to issue `pause`/`stop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use arm_core::GuestEventConsumer;
use arm_cpu::{ArchVersion, CoreRegister, ExecutionMetrics};
use arm_system::ArmSystem;

use crate::breakpoint::{Breakpoint, BreakpointKey};

const TEMP_BREAKPOINT_ID: u16 = 0xF000;
const SEED_BREAKPOINT_ID: u16 = 0xF001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialised,
    Paused,
    Running,
    Stopped,
}

/// The inputs needed to build a fresh `ArmSystem`, kept around so
/// `restart()` can tear down and recreate the same machine.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub arch: ArchVersion,
    pub ram_base: u32,
    pub ram_size: u32,
    pub rom: Option<(u32, Vec<u8>)>,
    pub entry_point: u32,
}

/// Owns an `ArmSystem`, its breakpoints, and the lifecycle state around
/// running/pausing it. Mirrors `EmulatorSession`'s operations; the worker
/// thread stands in for its `QtConcurrent`/`QFutureWatcher` pairing.
pub struct DebuggerSession {
    state: SessionState,
    system: Option<ArmSystem>,
    events: Option<GuestEventConsumer>,
    breakpoints: Vec<Breakpoint>,
    step_breakpoint: Option<Breakpoint>,
    last_options: Option<CreateOptions>,
    host_interrupt: Option<Arc<AtomicBool>>,
    worker: Option<thread::JoinHandle<()>>,
    result_rx: Option<mpsc::Receiver<(ArmSystem, ExecutionMetrics)>>,
}

impl Default for DebuggerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DebuggerSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialised,
            system: None,
            events: None,
            breakpoints: Vec::new(),
            step_breakpoint: None,
            last_options: None,
            host_interrupt: None,
            worker: None,
            result_rx: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn system(&self) -> Option<&ArmSystem> {
        self.system.as_ref()
    }

    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn create(&mut self, options: CreateOptions) -> Result<(), String> {
        self.destroy();

        let (mut system, consumer) = ArmSystem::new(options.arch);
        if !system.add_ram("RAM", options.ram_base, options.ram_size) {
            return Err("failed to map RAM".to_string());
        }
        if let Some((base, image)) = options.rom.clone() {
            if !system.add_rom("ROM", base, image) {
                return Err("failed to map ROM".to_string());
            }
        }
        system.set_core_register(CoreRegister::R(15), options.entry_point);

        self.system = Some(system);
        self.events = Some(consumer);
        self.state = SessionState::Paused;
        self.last_options = Some(options);
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.state == SessionState::Running {
            let _ = self.pause();
        }
        self.breakpoints.clear();
        self.state = SessionState::Uninitialised;
        self.system = None;
        self.events = None;
        self.host_interrupt = None;
    }

    /// Tears down and recreates the system with its last-used options,
    /// reapplying whichever breakpoints were enabled beforehand.
    pub fn restart(&mut self) -> Result<(), String> {
        let Some(options) = self.last_options.clone() else {
            return Err("no prior session to restart".to_string());
        };
        let old_breakpoints = std::mem::take(&mut self.breakpoints);
        self.destroy();
        self.create(options)?;

        for old in old_breakpoints {
            let mut fresh = Breakpoint::new(old.address(), old.is_logical_address(), old.id());
            if old.is_enabled() {
                if let Some(system) = &mut self.system {
                    fresh.apply(system);
                }
            }
            self.breakpoints.push(fresh);
        }
        Ok(())
    }

    /// Allocates the next unused breakpoint id, starting at `0xF001` and
    /// wrapping through `u16`, skipping the reserved temporary id `0xF000`.
    fn next_breakpoint_id(&self) -> Option<u16> {
        let mut id = SEED_BREAKPOINT_ID;
        loop {
            if id != TEMP_BREAKPOINT_ID && !self.breakpoints.iter().any(|b| b.id() == id) {
                return Some(id);
            }
            id = id.wrapping_add(1);
            if id == SEED_BREAKPOINT_ID {
                return None;
            }
        }
    }

    /// Sets a breakpoint at `address`, or returns the id of one already
    /// there. Fails if the address isn't backed by writable host memory.
    pub fn add_breakpoint(&mut self, address: u32, is_logical_address: bool) -> Result<u16, String> {
        let masked = address & !3;
        if let Some(index) = self.find_breakpoint_index(masked, is_logical_address) {
            return Ok(self.breakpoints[index].id());
        }

        let Some(system) = &mut self.system else {
            return Err("no active system".to_string());
        };
        let Some(id) = self.next_breakpoint_id() else {
            return Err("too many breakpoints set already".to_string());
        };

        let mut breakpoint = Breakpoint::new(masked, is_logical_address, id);
        if !breakpoint.apply(system) {
            return Err("address is not backed by writable host memory".to_string());
        }

        let key = breakpoint.key();
        let pos = self.breakpoints.partition_point(|b| b.key() < key);
        self.breakpoints.insert(pos, breakpoint);
        Ok(id)
    }

    pub fn remove_breakpoint(&mut self, id: u16) {
        if let Some(index) = self.breakpoints.iter().position(|b| b.id() == id) {
            if let Some(system) = &mut self.system {
                self.breakpoints[index].remove(system);
            }
            self.breakpoints.remove(index);
        }
    }

    /// Enables or disables a breakpoint in place, re-patching or restoring
    /// guest memory as appropriate.
    pub fn set_breakpoint_enabled(&mut self, id: u16, enabled: bool) -> bool {
        let Some(index) = self.breakpoints.iter().position(|b| b.id() == id) else {
            return false;
        };
        let Some(system) = &mut self.system else {
            return false;
        };
        if enabled {
            self.breakpoints[index].apply(system)
        } else {
            self.breakpoints[index].remove(system);
            true
        }
    }

    fn find_breakpoint_index(&self, address: u32, is_logical_address: bool) -> Option<usize> {
        let key = BreakpointKey(is_logical_address, address & !3);
        self.breakpoints.iter().position(|b| b.key() == key)
    }

    /// Finds a breakpoint at `pc`, trying a logical-address match first and
    /// falling back to physical, mirroring the original two-pass lookup.
    fn find_breakpoint_at_pc(&self, pc: u32) -> Option<usize> {
        self.find_breakpoint_index(pc, true).or_else(|| self.find_breakpoint_index(pc, false))
    }

    pub fn step(&mut self) -> Result<(), String> {
        if self.state != SessionState::Paused {
            return Err("session is not paused".to_string());
        }
        let system = self.system.as_mut().ok_or("no active system")?;
        system.run_single_step();
        self.drain_events();
        Ok(())
    }

    /// Steps past the current instruction: sets a temporary breakpoint at
    /// the next instruction and resumes, so a `BL` call runs to completion
    /// instead of being stepped into one instruction at a time.
    pub fn step_over(&mut self) -> Result<(), String> {
        let pc = self.system.as_ref().ok_or("no active system")?.core_register(CoreRegister::R(15));
        self.run_until(pc.wrapping_add(4))
    }

    /// Runs until the current function returns: sets a temporary breakpoint
    /// at the address held in the link register and resumes.
    pub fn step_out(&mut self) -> Result<(), String> {
        let lr = self.system.as_ref().ok_or("no active system")?.core_register(CoreRegister::R(14));
        self.run_until(lr)
    }

    /// Common machinery for `step_over`/`step_out`: installs a one-shot
    /// breakpoint at `address` and resumes. `rewind_past_breakpoint` removes
    /// it and steps PC back once the subsequent `pause`/`poll` observes it
    /// was hit.
    fn run_until(&mut self, address: u32) -> Result<(), String> {
        if self.state != SessionState::Paused {
            return Err("session is not paused".to_string());
        }
        let system = self.system.as_mut().ok_or("no active system")?;
        let mut temp = Breakpoint::new(address, true, TEMP_BREAKPOINT_ID);
        if !temp.apply(system) {
            return Err("address is not backed by writable host memory".to_string());
        }
        self.step_breakpoint = Some(temp);
        self.resume()
    }

    pub fn resume(&mut self) -> Result<(), String> {
        if self.state != SessionState::Paused {
            return Err("session is not paused".to_string());
        }
        let mut system = self.system.take().ok_or("no active system")?;

        let pc = system.core_register(CoreRegister::R(15));
        if let Some(index) = self.find_breakpoint_at_pc(pc) {
            if self.breakpoints[index].is_enabled() {
                self.breakpoints[index].remove(&mut system);
                system.run_single_step();
                self.breakpoints[index].apply(&mut system);
            }
        }

        self.host_interrupt = Some(system.host_interrupt_handle());

        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let metrics = system.run();
            let _ = tx.send((system, metrics));
        });

        self.worker = Some(handle);
        self.result_rx = Some(rx);
        self.state = SessionState::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), String> {
        if self.state != SessionState::Running {
            return Err("session is not running".to_string());
        }
        if let Some(interrupt) = &self.host_interrupt {
            interrupt.store(true, Ordering::Release);
        }

        let rx = self.result_rx.take().ok_or("no worker running")?;
        let (system, _metrics) = rx.recv().map_err(|_| "emulator thread ended unexpectedly".to_string())?;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.system = Some(system);
        self.state = SessionState::Paused;
        self.rewind_past_breakpoint();
        self.drain_events();
        Ok(())
    }

    /// Non-blocking check for whether a `resume()`d run has finished.
    /// Returns `true` if the session transitioned back to `Paused`. The
    /// controller calls this on a short timer in place of the original's
    /// `QTimer`-driven `onPollEmulator`.
    pub fn poll(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        let Some(rx) = &self.result_rx else {
            return false;
        };
        let Ok((system, _metrics)) = rx.try_recv() else {
            return false;
        };

        self.result_rx = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.system = Some(system);
        self.state = SessionState::Paused;
        self.rewind_past_breakpoint();
        self.drain_events();
        true
    }

    /// If the run stopped because it just executed a BKPT, restore the
    /// original instruction and step PC back so the next resume
    /// transparently re-executes it.
    fn rewind_past_breakpoint(&mut self) {
        let Some(system) = &mut self.system else {
            return;
        };
        let last_pc = system.core_register(CoreRegister::R(15)).wrapping_sub(4);

        if let Some(index) = self.find_breakpoint_index(last_pc, true).or_else(|| self.find_breakpoint_index(last_pc, false)) {
            self.breakpoints[index].remove(system);
            system.set_core_register(CoreRegister::R(15), last_pc);
        } else if self.step_breakpoint.as_ref().is_some_and(|b| b.address() == last_pc) {
            system.set_core_register(CoreRegister::R(15), last_pc);
        }

        if let Some(mut step_bp) = self.step_breakpoint.take() {
            step_bp.remove(system);
        }
    }

    fn drain_events(&mut self) {
        if let Some(events) = &mut self.events {
            while events.try_dequeue().is_some() {}
        }
    }

    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        if self.state == SessionState::Running {
            let _ = self.pause();
        }
        self.state = SessionState::Stopped;

        if let Some(system) = &mut self.system {
            for breakpoint in &mut self.breakpoints {
                breakpoint.remove(system);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CreateOptions {
        CreateOptions {
            arch: ArchVersion::V4,
            ram_base: 0x8000,
            ram_size: 0x1000,
            rom: None,
            entry_point: 0x8000,
        }
    }

    #[test]
    fn create_transitions_to_paused() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn step_executes_one_instruction() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        session.system.as_mut().unwrap().write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap();

        session.step().unwrap();
        assert_eq!(session.system().unwrap().core_register(CoreRegister::R(0)), 42);
    }

    #[test]
    fn resume_then_pause_round_trips_through_worker_thread() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        // BKPT #1 at the entry point so resume() returns almost immediately.
        let bkpt_word = arm_cpu::ProcessorCore::encode_breakpoint(1);
        session.system.as_mut().unwrap().write_phys(0x8000, &bkpt_word.to_le_bytes()).unwrap();

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn add_breakpoint_then_resume_pauses_at_it() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        session.system.as_mut().unwrap().write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap(); // MOV R0, #42
        session.system.as_mut().unwrap().write_phys(0x8004, &0xE3A0_102Au32.to_le_bytes()).unwrap(); // MOV R1, #42

        let id = session.add_breakpoint(0x8004, false).unwrap();
        session.resume().unwrap();
        session.pause().unwrap();

        assert_eq!(session.system().unwrap().core_register(CoreRegister::R(15)), 0x8004);
        assert!(!session.breakpoints().iter().find(|b| b.id() == id).unwrap().is_enabled());
    }

    #[test]
    fn step_over_runs_to_the_next_instruction_and_cleans_up() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        session.system.as_mut().unwrap().write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap(); // MOV R0, #42
        session.system.as_mut().unwrap().write_phys(0x8004, &0xE3A0_102Au32.to_le_bytes()).unwrap(); // MOV R1, #42

        session.step_over().unwrap();
        session.pause().unwrap();

        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.system().unwrap().core_register(CoreRegister::R(15)), 0x8004);
        assert_eq!(session.system().unwrap().core_register(CoreRegister::R(0)), 42);
        assert!(session.breakpoints().is_empty(), "the temporary breakpoint must not linger");

        let mut word = [0u8; 4];
        session.system.as_mut().unwrap().read_phys(0x8004, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), 0xE3A0_102A, "the instruction at the temp breakpoint is restored");
    }

    #[test]
    fn step_out_runs_to_the_link_register_address() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        session.system.as_mut().unwrap().set_core_register(CoreRegister::R(14), 0x800C);
        session.system.as_mut().unwrap().write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap(); // MOV R0, #42

        session.step_out().unwrap();
        session.pause().unwrap();

        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.system().unwrap().core_register(CoreRegister::R(15)), 0x800C);
        assert!(session.breakpoints().is_empty());
    }

    #[test]
    fn stop_restores_all_breakpointed_instructions() {
        let mut session = DebuggerSession::new();
        session.create(options()).unwrap();
        session.system.as_mut().unwrap().write_phys(0x8000, &0xE3A0_002Au32.to_le_bytes()).unwrap();
        session.add_breakpoint(0x8000, false).unwrap();

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);

        let mut word = [0u8; 4];
        session.system.as_mut().unwrap().read_phys(0x8000, &mut word).unwrap();
        assert_eq!(u32::from_le_bytes(word), 0xE3A0_002A);
    }
}
