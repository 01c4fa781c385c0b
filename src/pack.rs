//! Concurrent packing stage
//!
//! Dispatches one engine invocation per sprite job on its own thread and
//! joins on all of them before the rewrite stage runs. Results land in
//! per-job slots keyed by dispatch index, so completion order never affects
//! output order. A job that fails, panics, or outlives the optional deadline
//! costs only its own sheet.

use crate::engine::{PackEngine, PackError, PackOutput, PackRequest, PackSource, Placement};
use crate::fileset::FileSet;
use crate::group::SpriteJob;
use crate::registry::ImageRegistry;
use crate::report::{BuildLog, SpriteError};
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A successfully packed sheet, ready to enter the file set.
#[derive(Debug, Clone)]
pub struct PackedSprite {
    /// Project path of the sheet
    pub path: String,
    pub dpr: u32,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
    /// PNG-encoded sheet contents
    pub image: Vec<u8>,
    pub placements: HashMap<String, Placement>,
}

/// Run every job through the engine concurrently and join.
///
/// Placements are written back onto the registry entries of successful jobs.
/// Failed jobs are logged and dropped; the returned sheets follow job order.
pub fn pack_sprite_jobs(
    jobs: &[SpriteJob],
    registry: &mut ImageRegistry,
    files: &FileSet,
    engine: &Arc<dyn PackEngine>,
    timeout: Option<Duration>,
    log: &mut BuildLog,
) -> Vec<PackedSprite> {
    if jobs.is_empty() {
        return Vec::new();
    }

    let requests: Vec<PackRequest> = jobs
        .iter()
        .map(|job| PackRequest {
            sources: job
                .entries
                .iter()
                .filter_map(|&idx| {
                    let entry = registry.entry(idx);
                    files.get(&entry.path).map(|file| PackSource {
                        path: entry.path.clone(),
                        data: file.data.clone(),
                    })
                })
                .collect(),
            padding: job.padding,
        })
        .collect();

    let (tx, rx) = mpsc::channel::<(usize, Result<PackOutput, PackError>)>();
    for (slot, request) in requests.into_iter().enumerate() {
        let tx = tx.clone();
        let engine = Arc::clone(engine);
        thread::spawn(move || {
            let result = engine.pack(&request);
            // The receiver may have given up on us already.
            let _ = tx.send((slot, result));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<Result<PackOutput, PackError>>> =
        (0..jobs.len()).map(|_| None).collect();
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut pending = jobs.len();
    let mut timed_out = false;
    while pending > 0 {
        let received = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(msg) => Some(msg),
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        None
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => None,
                }
            }
            None => rx.recv().ok(),
        };
        match received {
            Some((slot, result)) => {
                slots[slot] = Some(result);
                pending -= 1;
            }
            None => break,
        }
    }

    let mut sheets = Vec::new();
    for (job, slot) in jobs.iter().zip(slots.into_iter()) {
        match slot {
            Some(Ok(output)) => {
                let mut complete = true;
                for &idx in &job.entries {
                    let entry = registry.entry_mut(idx);
                    match output.placements.get(&entry.path) {
                        Some(&placement) => entry.placement = Some(placement),
                        None => {
                            complete = false;
                            let path = entry.path.clone();
                            log.error(&SpriteError::Packing {
                                target: job.target.clone(),
                                message: format!("engine returned no placement for {}", path),
                            });
                        }
                    }
                }
                if complete {
                    sheets.push(PackedSprite {
                        path: job.target.clone(),
                        dpr: job.dpr,
                        width: output.width,
                        height: output.height,
                        size_bytes: output.image.len(),
                        image: output.image,
                        placements: output.placements,
                    });
                }
            }
            Some(Err(err)) => {
                log.error(&SpriteError::Packing {
                    target: job.target.clone(),
                    message: err.to_string(),
                });
            }
            None => {
                let message = if timed_out {
                    "packing did not finish before the deadline".to_string()
                } else {
                    "packing worker exited without reporting a result".to_string()
                };
                log.error(&SpriteError::Packing { target: job.target.clone(), message });
            }
        }
    }
    sheets
}
