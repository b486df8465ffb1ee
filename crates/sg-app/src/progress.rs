use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes read from the end of the engine log when looking for progress.
const LOG_TAIL_BYTES: u64 = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Admitting,
    Materializing,
    Launching,
    Running,
    Terminating,
    Aggregating,
    SavingManifest,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::Admitting => "Waiting for a slot",
            RunStage::Materializing => "Preparing configuration",
            RunStage::Launching => "Launching engine",
            RunStage::Running => "Running",
            RunStage::Terminating => "Terminating",
            RunStage::Aggregating => "Aggregating runs",
            RunStage::SavingManifest => "Saving manifest",
            RunStage::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    /// Last completion percentage reported by the engine.
    pub percent: Option<u32>,
}

/// Last percentage printed in `text`, e.g. `...40%...50%` gives 50.
///
/// Lines are scanned from the end; within a line the last `<digits>%` wins.
pub fn last_percentage(text: &str) -> Option<u32> {
    text.lines().rev().find_map(line_percentage)
}

fn line_percentage(line: &str) -> Option<u32> {
    let bytes = line.as_bytes();
    (0..bytes.len()).rev().find_map(|i| {
        if bytes[i] != b'%' {
            return None;
        }
        let digits_start = line[..i]
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map_or(i, |(p, _)| p);
        if digits_start == i {
            return None;
        }
        line[digits_start..i].parse::<u32>().ok().map(|p| p.min(100))
    })
}

/// Completion percentage from the engine log at `path`; 0 when there is no
/// log or no percentage in it yet.
pub fn read_log_percentage(path: &Path) -> io::Result<u32> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(LOG_TAIL_BYTES)))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;

    Ok(last_percentage(&String::from_utf8_lossy(&tail)).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_last_percentage() {
        let log = "Processing configuration\nSimulation 1...10%...20%...30%\nSaving results\n";
        assert_eq!(last_percentage(log), Some(30));
    }

    #[test]
    fn ignores_lines_without_numbers() {
        assert_eq!(last_percentage("done 100%\nrate %\n"), Some(100));
        assert_eq!(last_percentage("starting\n"), None);
        assert_eq!(last_percentage(""), None);
    }

    #[test]
    fn missing_log_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_log_percentage(&dir.path().join("run-abc123.log")).unwrap(), 0);

        let path = dir.path().join("run-abc123.log");
        std::fs::write(&path, "run 1 of 2 ...50%\n").unwrap();
        assert_eq!(read_log_percentage(&path).unwrap(), 50);
    }
}
