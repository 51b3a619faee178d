//! In-process stand-ins for the external worker and transcoder.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use fast_stt::ipc::wait::WaitPolicy;
use fast_stt::{JobError, Message, Preprocessor, WorkerLiveness};
use tokio_util::sync::CancellationToken;

/// What the simulated worker does with the next job.
#[derive(Debug, Clone)]
pub enum Reply {
    Transcript(String),
    Failure(Option<String>),
    /// Never answer and never consume anything.
    Silent,
}

/// Channel contents seen by the worker when the input arrived.
#[derive(Debug, Clone, Default)]
pub struct JobSnapshot {
    pub files: BTreeMap<String, String>,
}

impl JobSnapshot {
    pub fn has(&self, message: Message) -> bool {
        self.files.contains_key(message.file_name())
    }

    pub fn text(&self, message: Message) -> Option<&str> {
        self.files.get(message.file_name()).map(String::as_str)
    }
}

/// A worker thread following the channel protocol: on input arrival read
/// every present file, post the outcome, then delete what it consumed.
pub struct FakeWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    jobs: Arc<Mutex<Vec<JobSnapshot>>>,
}

impl FakeWorker {
    pub fn spawn(dir: &Path) -> Self {
        Self::start(dir, false)
    }

    /// A worker that deletes the parameter files it read but leaves the
    /// input payload for the controller to remove.
    pub fn spawn_leaving_input(dir: &Path) -> Self {
        Self::start(dir, true)
    }

    fn start(dir: &Path, leave_input: bool) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let replies = Arc::new(Mutex::new(VecDeque::new()));
        let jobs = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let dir = dir.to_path_buf();
            let stop = stop.clone();
            let replies = replies.clone();
            let jobs = jobs.clone();
            thread::spawn(move || worker_loop(&dir, leave_input, &stop, &replies, &jobs))
        };

        Self {
            stop,
            handle: Some(handle),
            replies,
            jobs,
        }
    }

    pub fn reply_with(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Drop for FakeWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    dir: &Path,
    leave_input: bool,
    stop: &AtomicBool,
    replies: &Mutex<VecDeque<Reply>>,
    jobs: &Mutex<Vec<JobSnapshot>>,
) {
    let input = dir.join(Message::Input.file_name());
    // Modification time of an input left unanswered on purpose.
    let mut ignored: Option<SystemTime> = None;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));

        let Ok(modified) = std::fs::metadata(&input).and_then(|m| m.modified()) else {
            continue;
        };
        if ignored == Some(modified) {
            continue;
        }

        let snapshot = snapshot(dir);
        jobs.lock().unwrap().push(snapshot.clone());

        let reply = replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Transcript("hello world".to_string()));

        match reply {
            Reply::Transcript(text) => post(dir, Message::Result, &text),
            Reply::Failure(reason) => post(dir, Message::Failure, reason.as_deref().unwrap_or("")),
            Reply::Silent => {
                ignored = Some(modified);
                continue;
            }
        }

        for name in snapshot.files.keys() {
            if leave_input && name == Message::Input.file_name() {
                continue;
            }
            let _ = std::fs::remove_file(dir.join(name));
        }
        // Answered; a payload still present is not a new job.
        ignored = Some(modified);
    }
}

fn snapshot(dir: &Path) -> JobSnapshot {
    let mut files = BTreeMap::new();
    for entry in std::fs::read_dir(dir).unwrap().flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == Message::Input.file_name() {
            files.insert(name, String::new());
            continue;
        }
        let text = std::fs::read_to_string(entry.path()).unwrap_or_default();
        files.insert(name, text);
    }
    JobSnapshot { files }
}

fn post(dir: &Path, message: Message, text: &str) {
    let path = dir.join(message.file_name());
    let partial = dir.join(format!("{}.partial", message.file_name()));
    std::fs::write(&partial, text).unwrap();
    std::fs::rename(partial, path).unwrap();
}

/// Stands in for ffmpeg by copying the source.
#[derive(Clone, Default)]
pub struct CopyPreprocessor {
    pub calls: Arc<AtomicUsize>,
}

impl Preprocessor for CopyPreprocessor {
    fn preprocess(
        &self,
        input: &Path,
        output: &Path,
        _policy: WaitPolicy,
        _cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::copy(input, output)
            .map(|_| ())
            .map_err(|e| JobError::PreprocessingFailed(e.to_string()))
    }
}

pub struct Alive;

impl WorkerLiveness for Alive {
    fn check_alive(&self) -> Result<(), JobError> {
        Ok(())
    }
}

pub struct Dead;

impl WorkerLiveness for Dead {
    fn check_alive(&self) -> Result<(), JobError> {
        Err(JobError::WorkerExited("exit code 1".to_string()))
    }
}

/// A source audio file inside `dir`.
pub fn source_file(dir: &Path) -> PathBuf {
    let path = dir.join("meeting.wav");
    std::fs::write(&path, b"RIFF....WAVE").unwrap();
    path
}

/// Files left in the channel directory.
pub fn channel_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
