use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{load_sound_file, AlarmError, AudioSink, SoundHandle};

/// Plays the clip by running an external player (`paplay`, `afplay`,
/// `ffplay -nodisp -autoexit`, ...) with the clip path as last argument.
///
/// Busy from spawn until the player exits.
#[derive(Debug)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    busy: AtomicBool,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            busy: AtomicBool::new(false),
        }
    }

    /// Split a whitespace separated command line into program and arguments.
    pub fn from_command_line(line: &str) -> Result<Self, AlarmError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(AlarmError::EmptyPlayerCommand)?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AudioSink for CommandSink {
    fn load(&self, resource: &Path) -> Result<SoundHandle, AlarmError> {
        load_sound_file(resource)
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn play(&self, sound: &SoundHandle) -> Result<(), AlarmError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let _guard = BusyGuard(&self.busy);

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&sound.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if !status.success() {
            tracing::warn!(
                program = %self.program,
                status = %status,
                "Alarm player exited unsuccessfully"
            );
        }
        Ok(())
    }
}
