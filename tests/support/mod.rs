//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use beanstalk_worker::queue::{Job, QueueClient, QueueError};
use beanstalk_worker::worker::{SectionLog, WorkerLog};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Queue client that serves canned jobs and records every call.
pub struct RecordingQueue {
    calls: Arc<Mutex<Vec<String>>>,
    jobs: VecDeque<Job>,
}

impl RecordingQueue {
    pub fn new(jobs: Vec<Job>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let queue = Self {
            calls: Arc::clone(&calls),
            jobs: jobs.into(),
        };
        (queue, calls)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueClient for RecordingQueue {
    async fn watch(&mut self, tube: &str) -> Result<usize, QueueError> {
        self.record(format!("watch {tube}"));
        Ok(2)
    }

    async fn ignore(&mut self, tube: &str) -> Result<usize, QueueError> {
        self.record(format!("ignore {tube}"));
        Ok(1)
    }

    async fn reserve(&mut self) -> Result<Job, QueueError> {
        self.record("reserve".to_string());
        self.jobs.pop_front().ok_or(QueueError::ConnectionClosed)
    }

    async fn delete(&mut self, job: &Job) -> Result<(), QueueError> {
        self.record(format!("delete {}", job.id));
        Ok(())
    }

    async fn bury(&mut self, job: &Job, priority: u32) -> Result<(), QueueError> {
        self.record(format!("bury {} {priority}", job.id));
        Ok(())
    }
}

/// Section sink that keeps what it was sent.
#[derive(Default)]
pub struct RecordingSection {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl SectionLog for RecordingSection {
    fn log_section(&self, section: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((section.to_string(), message.to_string()));
    }
}

pub fn open_log(dir: &Path, worker: &str) -> WorkerLog {
    WorkerLog::open(dir, "frontend", "test", worker).expect("open worker log")
}

pub fn log_path(dir: &Path, worker: &str) -> PathBuf {
    dir.join(format!("frontend_test_{worker}.log"))
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read worker log")
        .lines()
        .map(str::to_string)
        .collect()
}
