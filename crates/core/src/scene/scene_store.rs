use std::fs;
use std::io;
use std::path::Path;

use crate::levels::SCENES;

use super::scene::SceneBank;

impl SceneBank {
    /// Restores scenes from a `scenes.txt` style file, one `name;v1;...;v16` line per scene
    /// in scene-number order.
    ///
    /// A missing or unreadable file leaves every scene at its defaults; a malformed line
    /// leaves only that scene at its defaults. Returns the number of scenes restored.
    pub fn load(&self, path: &Path) -> usize {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No scene file at {}, starting with empty scenes", path.display());
                return 0;
            }
            Err(e) => {
                log::warn!("Could not read scene file {}: {}", path.display(), e);
                return 0;
            }
        };

        let mut restored = 0;
        let mut scenes = self.lock();
        for (scene, line) in scenes.iter_mut().zip(content.lines().take(SCENES)) {
            if scene.parse_line(line) {
                restored += 1;
            } else {
                log::warn!(
                    "Ignoring malformed entry for scene {} in {}",
                    scene.number(),
                    path.display()
                );
            }
        }

        log::info!("Restored {} scenes from {}", restored, path.display());
        restored
    }

    /// Writes all scenes to `path`, one line per scene.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = {
            let scenes = self.lock();
            let mut content = String::new();
            for scene in scenes.iter() {
                content.push_str(&scene.to_string());
                content.push('\n');
            }
            content
        };

        fs::write(path, content)?;
        log::info!("Saved scenes to {}", path.display());
        Ok(())
    }
}
