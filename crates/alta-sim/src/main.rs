//! alta-sim — lossy-channel simulation of an ALTA stream.
//!
//! Runs a producer and a consumer back to back over a simulated dropping
//! datagram channel: every payload is serialized, possibly dropped (with
//! bursts), then parsed and verified on the consumer side exactly as a
//! remote peer would.
//!
//! Usage:
//!   alta-sim                                # a=3, p=5, 151 payloads, 5% loss
//!   alta-sim --loss-pct 10 --seed 7
//!   alta-sim --strength 2 --period 7 --count 500 --json

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use alta_codec::Payload;
use alta_core::types::Index;
use alta_crypto::SigningKey;
use alta_scheme::AugmentedScheme;
use alta_stream::{Consumer, Producer};

#[derive(Parser, Debug)]
#[command(
    name = "alta-sim",
    version,
    about = "ALTA lossy-stream simulator — producer to consumer over a dropping channel"
)]
struct Args {
    /// Scheme strength: redundant long-range chains per period.
    #[arg(long, default_value_t = 3)]
    strength: u32,

    /// Scheme period: 1, 2, or odd >= 3.
    #[arg(long, default_value_t = 5)]
    period: u32,

    /// Number of payloads to stream.
    #[arg(long, default_value_t = 151)]
    count: u32,

    /// Sign every Nth payload (default: strength * period). The final
    /// payload is always signed.
    #[arg(long)]
    signature_stride: Option<u32>,

    /// Percent of payloads dropped by the channel.
    #[arg(long, default_value_t = 5)]
    loss_pct: u32,

    /// Maximum extra payloads dropped per loss burst (default: period - 1).
    #[arg(long)]
    burst_max: Option<u32>,

    /// Consumer retention below the latest verified index.
    #[arg(long, default_value_t = 128)]
    pre_lv_window: u32,

    /// Consumer retention above the latest verified index.
    #[arg(long, default_value_t = 128)]
    post_lv_window: u32,

    /// RNG seed, for reproducible loss patterns.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Datagram size each payload is padded to.
    #[arg(long, default_value_t = 1472)]
    mtu: usize,

    /// Print the run report as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RunReport {
    strength: u32,
    period: u32,
    signature_stride: u32,
    loss_pct: u32,
    sent: u32,
    received: u32,
    delivered: u32,
    mismatch_events: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let stride = args
        .signature_stride
        .unwrap_or(args.strength * args.period)
        .max(1);
    let burst_max = args.burst_max.unwrap_or(args.period.saturating_sub(1)).max(1);

    let scheme = AugmentedScheme::new(args.strength, args.period)
        .context("constructing augmented scheme")?;
    let skey = SigningKey::generate();
    let vkey = skey.verify_key();

    let mut producer = Producer::new(scheme);
    let mut consumer = Consumer::with_windows(args.pre_lv_window, args.post_lv_window);
    let mut rng = StdRng::seed_from_u64(args.seed);

    info!(
        strength = args.strength,
        period = args.period,
        count = args.count,
        stride,
        loss_pct = args.loss_pct,
        "starting stream"
    );

    let mut sent = 0u32;
    let mut received = 0u32;
    let mut delivered = 0u32;
    let mut left_to_drop = 0u32;

    // One extra step past the end of the input shuts the producer down so
    // the tail drains through the same channel.
    for i in 0..=args.count {
        if i < args.count {
            let signed = i == args.count - 1 || i % stride == 0;
            let mut payload = Payload::new_by_index(i, signed.then(|| skey.clone()));
            let tag_max = payload.auth_tag().max_len(producer.scheme());
            payload.set_app_data(test_payload(i, tag_max, args.mtu));
            producer.push_payload(payload)?;
            sent += 1;
        } else {
            producer.shutdown();
        }

        for mut ready in producer.payloads_ready()? {
            let index = ready.index();
            let datagram = ready.to_bytes();
            debug!(
                index,
                hash = %ready.hash(),
                len = datagram.len(),
                signed = ready.auth_tag().signature_present(),
                "sent"
            );

            let drop = left_to_drop > 0 || rng.gen_range(1..=100) <= args.loss_pct;
            if drop {
                if left_to_drop > 0 {
                    left_to_drop -= 1;
                } else if burst_max > 1 {
                    left_to_drop = rng.gen_range(1..burst_max);
                }
                debug!(index, "dropped");
                continue;
            }

            let (recv, _) =
                Payload::from_bytes(&datagram, Some(&vkey)).context("parsing received payload")?;
            debug!(index = recv.index(), verified = recv.signature_valid(), "received");
            consumer.push_payload(recv, false);
            received += 1;

            for p in consumer.payloads_ready() {
                debug!(index = p.index(), hash = %p.hash(), "delivered");
                delivered += 1;
            }
        }
    }

    let mismatch_events = consumer.drain_events().len();
    if mismatch_events > 0 {
        warn!(mismatch_events, "hash mismatches observed");
    }

    let report = RunReport {
        strength: args.strength,
        period: args.period,
        signature_stride: stride,
        loss_pct: args.loss_pct,
        sent,
        received,
        delivered,
        mismatch_events,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let delivered_pct = 100.0 * delivered as f64 / sent.max(1) as f64;
        info!(sent, received, delivered, delivered_pct, "stream complete");
        println!(
            "sent: {sent}  received: {received}  delivered: {delivered}"
        );
    }
    Ok(())
}

/// Index header plus dot padding out to the datagram size, leaving room
/// for the fully chained tag.
fn test_payload(index: Index, tag_max_len: usize, mtu: usize) -> Vec<u8> {
    let mut data = format!("{index:04} ").into_bytes();
    let pad = mtu.saturating_sub(data.len() + tag_max_len);
    data.resize(data.len() + pad, b'.');
    data
}
