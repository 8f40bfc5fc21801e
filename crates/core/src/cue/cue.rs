use std::time::Duration;

use crate::error::ShowError;
use crate::levels::SCENES;

use super::cue_executor::CueContext;

/// One operation inside a cue.
#[derive(Clone, Debug, PartialEq)]
pub enum CueStep {
    /// Fade a scene in. Without an explicit time the default fade-in applies.
    SceneUp { scene: usize, fade: Option<Duration> },
    /// Fade a scene out. Without an explicit time the default fade-out applies.
    SceneDown { scene: usize, fade: Option<Duration> },
    Delay(Duration),
    /// Every scene out, immediately.
    Black,
    Play { song: u32 },
    Stop,
    Volume { percent: u8 },
}

/// Converts fractional seconds to whole milliseconds. Negative or non-finite times are rejected.
fn parse_seconds(token: &str) -> Option<Duration> {
    let seconds: f64 = token.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_millis((seconds * 1000.0).round() as u64))
}

fn parse_scene_number(token: &str) -> Option<usize> {
    let scene: usize = token.parse().ok()?;
    (1..=SCENES).contains(&scene).then_some(scene)
}

impl CueStep {
    /// Parses one step line, already split into whitespace separated tokens.
    ///
    /// `tokens[0]` is the keyword. Returns `Ok(None)` if the keyword is not a step.
    pub fn parse(tokens: &[&str], line: usize) -> Result<Option<Self>, ShowError> {
        let Some(keyword) = tokens.first() else {
            return Ok(None);
        };

        let step = match *keyword {
            "SCENE" => Self::parse_scene(tokens, line)?,
            "DELAY" => {
                if tokens.len() != 2 {
                    return Err(ShowError::parse(line, "DELAY must be followed by a time in seconds"));
                }
                let time = parse_seconds(tokens[1])
                    .ok_or_else(|| ShowError::parse(line, "DELAY with invalid time"))?;
                CueStep::Delay(time)
            }
            "BLACK" => {
                if tokens.len() != 1 {
                    return Err(ShowError::parse(line, "BLACK must not be followed by parameters"));
                }
                CueStep::Black
            }
            "PLAY" => {
                if tokens.len() != 2 {
                    return Err(ShowError::parse(line, "PLAY must be followed by a song number"));
                }
                let song = tokens[1]
                    .parse()
                    .map_err(|_| ShowError::parse(line, "PLAY with invalid song number"))?;
                CueStep::Play { song }
            }
            "STOP" => {
                if tokens.len() != 1 {
                    return Err(ShowError::parse(line, "STOP must not be followed by parameters"));
                }
                CueStep::Stop
            }
            "VOLUME" => {
                if tokens.len() != 2 {
                    return Err(ShowError::parse(line, "VOLUME must be followed by a value 0..100"));
                }
                let percent = tokens[1]
                    .parse::<u8>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| ShowError::parse(line, "VOLUME must be 0..100"))?;
                CueStep::Volume { percent }
            }
            _ => return Ok(None),
        };

        Ok(Some(step))
    }

    // SCENE <1..16> UP|DOWN [<secs>]
    fn parse_scene(tokens: &[&str], line: usize) -> Result<Self, ShowError> {
        if tokens.len() < 3 {
            return Err(ShowError::parse(line, "SCENE missing scene number or direction"));
        }
        if tokens.len() > 4 {
            return Err(ShowError::parse(line, "SCENE takes at most a scene number, direction and time"));
        }

        let scene = parse_scene_number(tokens[1])
            .ok_or_else(|| ShowError::parse(line, "SCENE with invalid scene number"))?;

        let fade = match tokens.get(3) {
            Some(token) => Some(
                parse_seconds(token)
                    .ok_or_else(|| ShowError::parse(line, "SCENE with invalid fade time"))?,
            ),
            None => None,
        };

        match tokens[2] {
            "UP" => Ok(CueStep::SceneUp { scene, fade }),
            "DOWN" => Ok(CueStep::SceneDown { scene, fade }),
            _ => Err(ShowError::parse(line, "SCENE must specify UP or DOWN")),
        }
    }

    /// Runs the step. Delays hold the calling task; nothing else waits on it.
    pub async fn execute(&self, context: &CueContext) {
        match *self {
            CueStep::SceneUp { scene, fade } => {
                let fade = fade.unwrap_or_else(|| context.defaults.fade_in());
                context.scenes.fade_in(scene, fade);
            }
            CueStep::SceneDown { scene, fade } => {
                let fade = fade.unwrap_or_else(|| context.defaults.fade_out());
                context.scenes.fade_out(scene, fade);
            }
            CueStep::Delay(time) => tokio::time::sleep(time).await,
            CueStep::Black => context.scenes.black(),
            CueStep::Play { song } => context.audio.play(song).await,
            CueStep::Stop => context.audio.stop().await,
            CueStep::Volume { percent } => context.audio.set_volume(percent).await,
        }
    }
}

/// A titled sequence of steps, the unit of show playback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cue {
    title: String,
    description: Vec<String>,
    steps: Vec<CueStep>,
}

impl Cue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &[String] {
        &self.description
    }

    pub fn steps(&self) -> &[CueStep] {
        &self.steps
    }

    pub(crate) fn add_description(&mut self, line: impl Into<String>) {
        self.description.push(line.into());
    }

    pub(crate) fn add_step(&mut self, step: CueStep) {
        self.steps.push(step);
    }
}
