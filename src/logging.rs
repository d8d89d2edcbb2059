use std::{
    fmt::Write as _,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::PathBuf,
    thread,
};

use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, unbounded, Sender};
use once_cell::sync::Lazy;

const LOG_FILE: &str = "sentiment_cron.log";

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new(LOG_FILE));

pub struct Logger {
    writer: Sender<LogEvent>,
}

enum LogEvent {
    Line(LogMessage),
    Flush(Sender<()>),
}

pub struct LogMessage {
    pub level: log::Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: log::Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

impl Logger {
    fn new(file_name: &str) -> Self {
        let log_path = PathBuf::from(file_name);
        let (tx, rx) = unbounded::<LogEvent>();

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .unwrap_or_else(|e| {
                    panic!("Failed to open log file: {}", e);
                });

            let mut writer = BufWriter::new(file);
            let mut line = String::with_capacity(1024);

            while let Ok(event) = rx.recv() {
                match event {
                    LogEvent::Line(received) => {
                        if writeln!(
                            &mut line,
                            "{} {} {}",
                            received.created_at.format("%F %X%.6f"),
                            received.level,
                            received.msg
                        )
                        .is_err()
                        {
                            continue;
                        }

                        if rx.is_empty() || line.len() >= 1024 {
                            if writer.write_all(line.as_bytes()).is_err() {
                                console(log::Level::Error, &line);
                            }
                            if writer.flush().is_err() {
                                console(log::Level::Error, &line);
                            }
                            line.clear();
                        }
                    }
                    LogEvent::Flush(ack) => {
                        if !line.is_empty() {
                            let _ = writer.write_all(line.as_bytes());
                            line.clear();
                        }
                        let _ = writer.flush();
                        let _ = ack.send(());
                    }
                }
            }
        });

        Logger { writer: tx }
    }

    fn send(&self, level: log::Level, msg: String) {
        console(level, &msg);
        if let Err(why) = self.writer.send(LogEvent::Line(LogMessage::new(level, msg))) {
            console(log::Level::Error, &why.to_string());
        }
    }

    /// 等待檔案寫入完成，於 process::exit 前呼叫
    fn drain(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(0);
        if self.writer.send(LogEvent::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

fn console(level: log::Level, msg: &str) {
    println!(
        "{} {} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        level,
        msg
    );
}

/// Logs a message at INFO level to both the log file and stdout.
pub fn info(log: String) {
    LOGGER.send(log::Level::Info, log);
}

/// Logs a message at ERROR level to both the log file and stdout.
pub fn error(log: String) {
    LOGGER.send(log::Level::Error, log);
}

/// Blocks until every queued line has been written to the log file.
pub fn flush() {
    LOGGER.drain();
}
