//! GOP-parallel encoding: a bounded task queue fans GOPs out to a worker
//! pool, and results are re-ordered by sequence number before they reach
//! the writer, so output packets always appear in encode order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use crossbeam_channel::{bounded, unbounded};
use tsvm_codec_tav::{CodecParams, TavEncoder};

pub struct GopResult {
    pub body: Vec<u8>,
    pub frame_count: u8,
}

/// Encodes every GOP yielded by `gops` and hands the compressed bodies to
/// `sink` in submission order. `threads = 0` uses one worker per logical
/// core.
pub fn encode_gops<I, F>(
    params: &CodecParams,
    threads: usize,
    gops: I,
    mut sink: F,
) -> anyhow::Result<()>
where
    I: Iterator<Item = Vec<Vec<u8>>>,
    F: FnMut(GopResult) -> anyhow::Result<()>,
{
    let threads = if threads == 0 {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        threads
    };

    let cancel = AtomicBool::new(false);
    let (task_tx, task_rx) = bounded::<(u64, Vec<Vec<u8>>)>(threads * 2);
    let (result_tx, result_rx) = unbounded::<(u64, anyhow::Result<GopResult>)>();

    std::thread::scope(|scope| {
        for _ in 0..threads {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = &cancel;
            let params = params.clone();
            scope.spawn(move || {
                let mut encoder = TavEncoder::new(params);
                while let Ok((seq, frames)) = task_rx.recv() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let frame_count = frames.len() as u8;
                    let result = encoder
                        .encode_gop(&frames)
                        .map(|body| GopResult { body, frame_count })
                        .map_err(anyhow::Error::from);
                    if result_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        let mut pending: BTreeMap<u64, anyhow::Result<GopResult>> = BTreeMap::new();
        let mut next_out = 0u64;
        let mut failure: Option<anyhow::Error> = None;

        let mut deliver = |pending: &mut BTreeMap<u64, anyhow::Result<GopResult>>,
                           next_out: &mut u64,
                           failure: &mut Option<anyhow::Error>,
                           sink: &mut F| {
            while let Some(result) = pending.remove(&*next_out) {
                *next_out += 1;
                match result.and_then(|r| sink(r)) {
                    Ok(()) => {}
                    Err(err) => {
                        if failure.is_none() {
                            *failure = Some(err);
                        }
                        cancel.store(true, Ordering::Relaxed);
                    }
                }
            }
        };

        for (seq, frames) in (0u64..).zip(gops) {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            // Drain finished results while feeding, so the reorder buffer
            // stays small.
            while let Ok((done_seq, result)) = result_rx.try_recv() {
                pending.insert(done_seq, result);
            }
            deliver(&mut pending, &mut next_out, &mut failure, &mut sink);
            if task_tx.send((seq, frames)).is_err() {
                break;
            }
        }
        drop(task_tx);

        while let Ok((done_seq, result)) = result_rx.recv() {
            pending.insert(done_seq, result);
            deliver(&mut pending, &mut next_out, &mut failure, &mut sink);
        }

        match failure {
            Some(err) => Err(err).context("GOP encoding failed"),
            None => Ok(()),
        }
    })
}
