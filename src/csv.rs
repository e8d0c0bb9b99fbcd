use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const SEP: char = ',';

/// Row-at-a-time CSV writer. The header goes out on construction.
pub struct CsvWriter<W: Write> {
    out: W,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W, header: &[&str]) -> io::Result<Self> {
        let mut writer = CsvWriter { out };
        writer.write_row(header)?;
        Ok(writer)
    }

    pub fn write_row<S: AsRef<str>>(&mut self, row: &[S]) -> io::Result<()> {
        write_row(&mut self.out, row)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Create `<dir>/<name>.csv`, replacing any previous file.
pub fn create(dir: &Path, name: &str, header: &[&str]) -> Result<CsvWriter<BufWriter<File>>> {
    let path = csv_path(dir, name);
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(CsvWriter::new(BufWriter::new(file), header)?)
}

/// Append one row to `path`, writing `header` first if the file is new.
pub fn append_row<S: AsRef<str>>(path: &Path, header: &[&str], row: &[S]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let fresh = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut w = BufWriter::new(file);
    if fresh {
        write_row(&mut w, header)?;
    }
    write_row(&mut w, row)?;
    w.flush()?;
    Ok(())
}

/// `<dir>/<name>.csv`, with path separators in `name` replaced.
pub fn csv_path(dir: &Path, name: &str) -> PathBuf {
    let name = name.trim_start_matches("Category:").replace(['/', '\\'], "_");
    dir.join(format!("{}.csv", name))
}

fn needs_quotes(field: &str) -> bool {
    field.contains(SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        let cell = cell.as_ref();
        if i > 0 {
            write!(w, "{}", SEP)?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}
