/// Plain-text training store under a single root directory.
///
/// `data.txt` holds one sample record per line and `label.txt` one identity
/// name per line. Missing files are seeded from a bundled defaults directory
/// when one is supplied, otherwise created empty.
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::classification::domain::labeled_sample::LabeledSample;
use crate::classification::domain::training_store::{StoreError, TrainingStore};
use crate::shared::constants::{DATA_FILE, LABEL_FILE};

pub struct TextFileStore {
    data_path: PathBuf,
    label_path: PathBuf,
}

impl TextFileStore {
    pub fn open(root: &Path, bundled_dir: Option<&Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

        let data_path = root.join(DATA_FILE);
        let label_path = root.join(LABEL_FILE);
        for (path, name) in [(&data_path, DATA_FILE), (&label_path, LABEL_FILE)] {
            install_default(path, bundled_dir.map(|d| d.join(name)))?;
        }

        log::debug!("Training store opened at {}", root.display());
        Ok(Self {
            data_path,
            label_path,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn label_path(&self) -> &Path {
        &self.label_path
    }

    fn append_lines<'a>(
        path: &Path,
        lines: impl Iterator<Item = std::borrow::Cow<'a, str>>,
    ) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        terminate_last_line(&mut file).map_err(|e| io_err(path, e))?;

        for line in lines {
            // One write per record so a failure never splits a line.
            let mut record = line.into_owned();
            record.push('\n');
            file.write_all(record.as_bytes())
                .map_err(|e| io_err(path, e))?;
        }
        file.flush().map_err(|e| io_err(path, e))?;
        file.sync_data().map_err(|e| io_err(path, e))
    }
}

impl TrainingStore for TextFileStore {
    fn load_samples(&self) -> Result<Vec<LabeledSample>, StoreError> {
        let text = fs::read_to_string(&self.data_path).map_err(|e| io_err(&self.data_path, e))?;
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                LabeledSample::parse_record(line).map_err(|source| StoreError::Malformed {
                    path: self.data_path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    fn append_samples(&mut self, samples: &[LabeledSample]) -> Result<(), StoreError> {
        if samples.is_empty() {
            return Ok(());
        }
        Self::append_lines(
            &self.data_path,
            samples.iter().map(|s| s.to_record().into()),
        )
    }

    fn load_names(&self) -> Result<Vec<String>, StoreError> {
        let text =
            fs::read_to_string(&self.label_path).map_err(|e| io_err(&self.label_path, e))?;
        let mut names: Vec<String> = text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        while names.last().is_some_and(|n| n.trim().is_empty()) {
            names.pop();
        }

        // Labels are line positions, so a gap would shift every later name.
        match names.iter().position(|n| n.trim().is_empty()) {
            Some(i) => Err(StoreError::BlankName {
                path: self.label_path.clone(),
                line: i + 1,
            }),
            None => Ok(names),
        }
    }

    fn append_name(&mut self, name: &str) -> Result<(), StoreError> {
        Self::append_lines(&self.label_path, std::iter::once(name.into()))
    }
}

fn install_default(path: &Path, bundled: Option<PathBuf>) -> Result<(), StoreError> {
    if path.exists() {
        return Ok(());
    }
    match bundled.filter(|b| b.exists()) {
        Some(src) => {
            log::info!("Seeding {} from {}", path.display(), src.display());
            fs::copy(&src, path).map_err(|e| io_err(path, e))?;
        }
        None => {
            File::create(path).map_err(|e| io_err(path, e))?;
        }
    }
    Ok(())
}

/// Appends a newline if the file's last byte isn't one, so the next
/// record starts on its own line.
fn terminate_last_line(file: &mut File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
