use chrono::{Local, NaiveDate};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SERVER_HOME_ENV: &str = "SONARHOME";
pub const SERVER_LOG_FOLDER: &str = "logs";

/// The scanner prints this before the background task URL. Older scanners
/// use the `INFO:` form, newer ones the padded `INFO  -` form.
const TASK_URL_MARKERS: [&str; 2] = [
    "INFO: More about the report processing at",
    "INFO  - More about the report processing at",
];

pub fn read_log_lines(path: &Path) -> io::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Returns the URL after the last task marker, or an empty string when the
/// log has none. A retried analysis logs the marker again, and the last one
/// is the task that matters.
pub fn extract_task_url<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = String::new();
    for line in lines {
        let line = line.as_ref();
        for marker in TASK_URL_MARKERS {
            if let Some((_, tail)) = line.split_once(marker) {
                url = tail.trim().to_string();
            }
        }
    }
    url
}

pub fn server_home() -> Option<PathBuf> {
    std::env::var_os(SERVER_HOME_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub fn server_log_folder(home: &Path) -> PathBuf {
    home.join(SERVER_LOG_FOLDER)
}

pub fn server_log_file(home: &Path, date: NaiveDate) -> PathBuf {
    server_log_folder(home).join(format!("sonar-{}.log", date.format("%Y%m%d")))
}

pub fn todays_server_log(home: &Path) -> PathBuf {
    server_log_file(home, Local::now().date_naive())
}

/// An open handle on the server log positioned at its end when opened, so
/// only lines written afterwards are read back.
#[derive(Debug)]
pub struct ServerLogTail {
    path: PathBuf,
    reader: BufReader<File>,
}

impl ServerLogTail {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        Ok(lines)
    }
}

fn log_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .collect::<Vec<_>>();
    files.sort();
    files
}

/// Deletes every `*.log` in the server log folder and returns how many were
/// removed. A missing folder removes nothing.
pub fn cleanup_logs(home: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for path in log_files(&server_log_folder(home)) {
        std::fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}

pub fn dump_logs(home: &Path) -> io::Result<String> {
    let mut output = String::new();
    for path in log_files(&server_log_folder(home)) {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.push_str(&format!("\n--- {name} ---\n"));
        output.push_str(&String::from_utf8_lossy(&std::fs::read(&path)?));
    }
    Ok(output)
}

/// True when some line of the file matches `pattern` at its start.
pub fn contains_line_matching(path: &Path, pattern: &str) -> crate::error::Result<bool> {
    let regex = Regex::new(&format!("^(?:{pattern})"))?;
    let lines = read_log_lines(path)?;
    Ok(lines.iter().any(|line| regex.is_match(line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn extract_task_url_returns_empty_without_marker() {
        let lines = ["INFO: Analysis report uploaded", "INFO: EXECUTION SUCCESS"];
        assert_eq!(extract_task_url(lines), "");
        assert_eq!(extract_task_url(Vec::<String>::new()), "");
    }

    #[test]
    fn extract_task_url_supports_both_marker_formats() {
        let lines = [
            "INFO: More about the report processing at http://localhost:9000/api/ce/task?id=AV1  ",
        ];
        assert_eq!(
            extract_task_url(lines),
            "http://localhost:9000/api/ce/task?id=AV1"
        );

        let lines = [
            "12:00:00.000 INFO  - More about the report processing at http://localhost:9000/api/ce/task?id=AV2",
        ];
        assert_eq!(
            extract_task_url(lines),
            "http://localhost:9000/api/ce/task?id=AV2"
        );
    }

    #[test]
    fn extract_task_url_last_marker_wins() {
        let lines = [
            "INFO: More about the report processing at http://host/api/ce/task?id=first",
            "INFO: retrying upload",
            "12:00 INFO  - More about the report processing at http://host/api/ce/task?id=second",
            "INFO: done",
        ];
        assert_eq!(extract_task_url(lines), "http://host/api/ce/task?id=second");
    }

    #[test]
    fn server_log_file_uses_daily_name() {
        let date = NaiveDate::from_ymd_opt(2016, 3, 7).expect("valid date");
        let path = server_log_file(Path::new("/opt/sonar"), date);
        assert_eq!(path, PathBuf::from("/opt/sonar/logs/sonar-20160307.log"));
    }

    #[test]
    fn read_log_lines_strips_line_endings() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("a.log");
        fs::write(&path, "one\r\ntwo\nthree").expect("log should write");

        let lines = read_log_lines(&path).expect("log should read");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn server_log_tail_reads_only_appended_lines() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("sonar.log");
        fs::write(&path, "old ERROR line\n").expect("log should write");

        let mut tail = ServerLogTail::open(&path).expect("tail should open");
        assert!(tail.read_new_lines().expect("read should work").is_empty());

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("log should open for append");
        writeln!(file, "new line 1").expect("append should work");
        writeln!(file, "new line 2").expect("append should work");

        let lines = tail.read_new_lines().expect("read should work");
        assert_eq!(lines, vec!["new line 1", "new line 2"]);
        assert_eq!(tail.path(), path.as_path());
    }

    #[test]
    fn cleanup_logs_removes_only_log_files() {
        let home = TempDir::new().expect("temp dir should be created");
        let folder = server_log_folder(home.path());
        fs::create_dir_all(&folder).expect("log folder should create");
        fs::write(folder.join("sonar.log"), "x").expect("write");
        fs::write(folder.join("web.log"), "x").expect("write");
        fs::write(folder.join("README.txt"), "x").expect("write");

        assert_eq!(cleanup_logs(home.path()).expect("cleanup should work"), 2);
        assert!(folder.join("README.txt").exists());
        assert!(!folder.join("sonar.log").exists());
    }

    #[test]
    fn cleanup_logs_tolerates_missing_folder() {
        let home = TempDir::new().expect("temp dir should be created");
        assert_eq!(cleanup_logs(home.path()).expect("cleanup should work"), 0);
    }

    #[test]
    fn dump_logs_prefixes_each_file() {
        let home = TempDir::new().expect("temp dir should be created");
        let folder = server_log_folder(home.path());
        fs::create_dir_all(&folder).expect("log folder should create");
        fs::write(folder.join("a.log"), "alpha\n").expect("write");
        fs::write(folder.join("b.log"), "beta\n").expect("write");

        let dump = dump_logs(home.path()).expect("dump should work");
        assert_eq!(dump, "\n--- a.log ---\nalpha\n\n--- b.log ---\nbeta\n");
    }

    #[test]
    fn contains_line_matching_is_prefix_anchored() {
        let dir = TempDir::new().expect("temp dir should be created");
        let path = dir.path().join("a.log");
        fs::write(&path, "INFO: Sensor C++ done\nERROR: Invalid report\n").expect("write");

        assert!(contains_line_matching(&path, ".*Invalid report").expect("match should run"));
        assert!(!contains_line_matching(&path, "Invalid report").expect("match should run"));
    }
}
