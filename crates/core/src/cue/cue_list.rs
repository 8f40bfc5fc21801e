use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::ShowError;

use super::cue::{Cue, CueStep};

/// Number of jump markers a show can define.
pub const MARKERS: usize = 4;

/// The compiled show: cues in script order, the cursor on the upcoming cue and the markers.
///
/// The cursor is `None` only when the list is empty. Navigation never executes anything.
#[derive(Debug, Default, Clone)]
pub struct CueList {
    cues: Vec<Arc<Cue>>,
    upcoming: Option<usize>,
    markers: [Option<usize>; MARKERS],
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(start) => &line[..start],
        None => line,
    }
}

impl CueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a show script.
    ///
    /// The first bad line aborts the whole script; nothing before it is kept.
    pub fn parse(script: &str) -> Result<Self, ShowError> {
        let mut cues: Vec<Cue> = Vec::new();
        // Target cue index and the line that set it
        let mut markers: [Option<(usize, usize)>; MARKERS] = [None; MARKERS];
        let mut in_description = false;

        for (index, raw) in script.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(raw).trim();

            if in_description {
                if line.is_empty() {
                    in_description = false;
                } else if let Some(cue) = cues.last_mut() {
                    cue.add_description(line);
                }
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(keyword) = tokens.first().copied() else {
                continue;
            };

            match keyword {
                "CUE" => {
                    let title = line[keyword.len()..].trim();
                    cues.push(Cue::new(title));
                    in_description = true;
                }
                "MARKER" => {
                    if cues.is_empty() {
                        return Err(ShowError::parse(line_no, "MARKER before the first CUE"));
                    }
                    if tokens.len() != 2 {
                        return Err(ShowError::parse(line_no, "MARKER must be followed by a number 1..4"));
                    }
                    let marker = tokens[1]
                        .parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MARKERS).contains(n))
                        .ok_or_else(|| ShowError::parse(line_no, "MARKER index must be 1..4"))?;
                    markers[marker - 1] = Some((cues.len(), line_no));
                }
                _ => {
                    let step = CueStep::parse(&tokens, line_no)?.ok_or_else(|| {
                        ShowError::parse(line_no, format!("Invalid token '{}'", keyword))
                    })?;
                    let cue = cues.last_mut().ok_or_else(|| {
                        ShowError::parse(line_no, format!("{} before the first CUE", keyword))
                    })?;
                    cue.add_step(step);
                }
            }
        }

        // A marker points at the cue that follows it, so one after the last cue has no target
        if let Some((_, line_no)) = markers.iter().flatten().find(|(index, _)| *index >= cues.len()) {
            return Err(ShowError::parse(*line_no, "MARKER is not followed by a CUE"));
        }

        let upcoming = if cues.is_empty() { None } else { Some(0) };
        Ok(Self {
            cues: cues.into_iter().map(Arc::new).collect(),
            upcoming,
            markers: markers.map(|marker| marker.map(|(index, _)| index)),
        })
    }

    /// Reads and compiles a show file. A missing file is an empty show.
    pub fn load(path: &Path) -> Result<Self, ShowError> {
        let script = match fs::read_to_string(path) {
            Ok(script) => script,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Show file {} not found, starting with no cues", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let list = Self::parse(&script)?;
        log::info!("Loaded {} cues from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn cues(&self) -> &[Arc<Cue>] {
        &self.cues
    }

    /// The cue the next trigger will execute.
    pub fn upcoming(&self) -> Option<Arc<Cue>> {
        self.upcoming.and_then(|i| self.cues.get(i)).cloned()
    }

    pub fn upcoming_index(&self) -> Option<usize> {
        self.upcoming
    }

    pub fn prev(&mut self) {
        if let Some(index) = self.upcoming {
            self.upcoming = Some(index.saturating_sub(1));
        }
    }

    pub fn next(&mut self) {
        if let Some(index) = self.upcoming {
            self.upcoming = Some((index + 1).min(self.cues.len().saturating_sub(1)));
        }
    }

    /// Moves the cursor to marker `n` (1..4). Undefined markers are ignored.
    pub fn goto_marker(&mut self, n: usize) {
        if let Some(index) = self.marker(n) {
            self.upcoming = Some(index);
        }
    }

    /// Cue index recorded for marker `n` (1..4).
    pub fn marker(&self, n: usize) -> Option<usize> {
        n.checked_sub(1)
            .and_then(|i| self.markers.get(i))
            .copied()
            .flatten()
    }
}
