//! Progress State & Renderer (C8).
//!
//! A single-writer, mutex-guarded progress box with throttled repaints and
//! EMA-smoothed ETA. Per §9 REDESIGN FLAGS, phase-exclusive fields live in a
//! tagged `ProgressPhase` variant rather than one flat struct with nullable
//! fields; the struct itself is never exposed across module boundaries,
//! only through the methods below (mirroring the teacher's encapsulation of
//! its `ProgressBar` inside `spotify/artists.rs` helper functions).

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use crate::mirror::TransferEvent;
use crate::types::{
    CompletionSummary, DownloadProgress, MessagePriority, ProgressBoxState, ProgressPhase,
    StatusMessage, UploadProgress,
};

pub struct ProgressBox {
    state: Mutex<ProgressBoxState>,
    bar: ProgressBar,
}

impl ProgressBox {
    pub fn new(show_title: &str, show_number: u32) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self {
            state: Mutex::new(ProgressBoxState::new(show_title, show_number)),
            bar,
        })
    }

    pub async fn reset_for_next_album(&self, show_title: &str, show_number: u32) {
        let mut guard = self.state.lock().await;
        guard.reset_for_next_album(show_title, show_number);
    }

    pub async fn set_show_total(&self, total: u64) {
        let mut guard = self.state.lock().await;
        guard.show_total = total;
        drop(guard);
        self.maybe_render().await;
    }

    pub async fn begin_track(&self, track_number: u32, track_total: u32, track_name: &str, format: u8) {
        let mut guard = self.state.lock().await;
        guard.phase = ProgressPhase::Download(DownloadProgress {
            track_number,
            track_total,
            track_name: track_name.to_string(),
            track_format: format,
            download_percent: 0.0,
            download_speed: 0.0,
            downloaded: 0,
            download_total: 0,
            download_eta: None,
            speed_history: Default::default(),
        });
        drop(guard);
        self.maybe_render().await;
    }

    /// Called from the HTTP body copy on every chunk (§4.7, §5 suspension points).
    pub async fn on_download_chunk(&self, downloaded_delta: u64, total: u64, elapsed: Duration) {
        let mut guard = self.state.lock().await;
        guard.show_downloaded += downloaded_delta;
        guard.accumulated_bytes += downloaded_delta;
        if let ProgressPhase::Download(dp) = &mut guard.phase {
            dp.downloaded += downloaded_delta;
            dp.download_total = total;
            dp.download_percent = if total > 0 {
                (dp.downloaded as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let instantaneous = if elapsed.as_secs_f64() > 0.0 {
                downloaded_delta as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            };
            dp.speed_history.push(instantaneous);
            dp.download_speed = dp.speed_history.smoothed();
            let remaining = total.saturating_sub(dp.downloaded);
            dp.download_eta = eta_from(remaining, dp.download_speed);
        }
        let show_total = guard.show_total;
        let show_downloaded = guard.show_downloaded;
        guard.show_percent = if show_total > 0 {
            (show_downloaded as f64 / show_total as f64) * 100.0
        } else {
            0.0
        };
        drop(guard);
        self.maybe_render().await;
    }

    pub async fn complete_track(&self, skipped: bool, errored: bool) {
        let mut guard = self.state.lock().await;
        guard.accumulated_tracks += 1;
        if skipped {
            guard.skipped_tracks += 1;
        }
        if errored {
            guard.error_tracks += 1;
        }
    }

    /// Download->Upload transition, triggered once all tracks complete and
    /// the mirror is enabled (§4.8 phase transitions).
    pub async fn begin_upload(&self) {
        let mut guard = self.state.lock().await;
        guard.phase = ProgressPhase::Upload(UploadProgress {
            upload_percent: 0.0,
            upload_speed: 0.0,
            uploaded: 0,
            upload_total: 0,
            upload_eta: None,
            upload_speed_history: Default::default(),
        });
        drop(guard);
        self.maybe_render().await;
    }

    pub async fn apply_upload_event(&self, event: &TransferEvent) {
        let mut guard = self.state.lock().await;
        if let ProgressPhase::Upload(up) = &mut guard.phase {
            up.uploaded = event.uploaded;
            up.upload_total = event.total;
            up.upload_percent = event.percent;
            up.upload_speed_history.push(parse_speed_mib_per_s(&event.speed));
            up.upload_speed = up.upload_speed_history.smoothed();
            let remaining = event.total.saturating_sub(event.uploaded);
            up.upload_eta = eta_from(remaining, up.upload_speed);
        }
        drop(guard);
        self.maybe_render().await;
    }

    /// Upload->Complete transition: verification succeeded or no upload was
    /// required. Rendered exactly once per album.
    pub async fn complete(&self) {
        let mut guard = self.state.lock().await;
        if guard.is_complete {
            return;
        }
        let duration = guard.start_time.elapsed();
        guard.completion_time = Some(Instant::now());
        guard.is_complete = true;
        let skipped = guard.skipped_tracks;
        let errored = guard.error_tracks;
        guard.phase = ProgressPhase::Complete(CompletionSummary {
            total_duration: duration,
            skipped_tracks: skipped,
            error_tracks: errored,
        });
        drop(guard);
        self.bar.finish_and_clear();
    }

    pub async fn set_message(&self, priority: MessagePriority, text: &str, ttl: Duration) {
        let mut guard = self.state.lock().await;
        let replace = match &guard.message {
            Some(existing) if existing.expires_at > Instant::now() => priority >= existing.priority,
            _ => true,
        };
        if replace {
            guard.message = Some(StatusMessage {
                priority,
                text: text.to_string(),
                expires_at: Instant::now() + ttl,
            });
        }
    }

    async fn maybe_render(&self) {
        let mut guard = self.state.lock().await;
        let now = Instant::now();
        let due = guard
            .last_render_at
            .is_none_or(|last| now.duration_since(last) >= guard.render_interval);
        if !due {
            return;
        }
        guard.last_render_at = Some(now);
        let line = render_line(&guard);
        drop(guard);
        self.bar.set_message(line);
    }
}

impl PartialOrd for MessagePriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MessagePriority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        rank(*self).cmp(&rank(*other))
    }
}

fn rank(p: MessagePriority) -> u8 {
    match p {
        MessagePriority::Status => 0,
        MessagePriority::Warning => 1,
        MessagePriority::Error => 2,
    }
}

fn eta_from(remaining: u64, speed: f64) -> Option<Duration> {
    if speed <= 0.0 || remaining == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(remaining as f64 / speed))
}

fn parse_speed_mib_per_s(speed: &str) -> f64 {
    crate::utils::parse_bytes(speed.trim_end_matches("/s")).unwrap_or(0) as f64
}

fn render_line(state: &ProgressBoxState) -> String {
    if let Some(msg) = &state.message {
        if msg.expires_at > Instant::now() {
            return msg.text.clone();
        }
    }
    match &state.phase {
        ProgressPhase::Download(dp) => format!(
            "{} [{}/{}] {} {:.1}%",
            state.show_title, dp.track_number, dp.track_total, dp.track_name, dp.download_percent
        ),
        ProgressPhase::Upload(up) => format!("{} uploading {:.1}%", state.show_title, up.upload_percent),
        ProgressPhase::Complete(summary) => format!(
            "{} complete in {:.1}s (skipped {}, errors {})",
            state.show_title,
            summary.total_duration.as_secs_f64(),
            summary.skipped_tracks,
            summary.error_tracks
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_is_empty_when_speed_non_positive() {
        assert_eq!(eta_from(100, 0.0), None);
        assert_eq!(eta_from(0, 5.0), None);
    }

    #[test]
    fn eta_divides_remaining_by_speed() {
        let eta = eta_from(100, 10.0).unwrap();
        assert!((eta.as_secs_f64() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn message_priority_ordering() {
        assert!(MessagePriority::Error > MessagePriority::Warning);
        assert!(MessagePriority::Warning > MessagePriority::Status);
    }

    #[tokio::test]
    async fn phase_transitions_flow_download_to_upload_to_complete() {
        let pb = ProgressBox::new("Red Rocks", 1);
        pb.begin_track(1, 3, "Track 1", 2).await;
        pb.begin_upload().await;
        pb.complete().await;
        let guard = pb.state.lock().await;
        assert!(matches!(guard.phase, ProgressPhase::Complete(_)));
        assert!(guard.is_complete);
    }
}
