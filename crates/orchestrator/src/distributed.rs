//! Distributed tracking pass across decomposed subdomains.
//!
//! Every subdomain tracks its own cloud in a separate thread. Droplets
//! that reach a processor patch are posted to the destination's mailbox
//! and adopted at the start of the next round, where they resume from the
//! step fraction they had reached. A pass ends once a round produces no
//! migrants.
//!
//! This is the thread-based stand-in for message passing between ranks:
//! each mailbox is an mpsc channel and each round is one scoped fork/join.

use std::sync::mpsc::{self, Sender};
use std::thread;

use kernel::{CarrierPhase, CloudError, PassReport, TransferRecord};
use thiserror::Error;

use crate::domain::Subdomain;

/// Settings of one distributed pass
#[derive(Debug, Clone, Copy)]
pub struct DistributedConfig {
    /// Duration of the time step being tracked (s)
    pub track_time: f64,
    /// Rounds of migrant exchange allowed before the pass is abandoned
    pub max_rounds: usize,
}

impl DistributedConfig {
    /// Pass of `track_time` with the default round limit.
    pub fn new(track_time: f64) -> Self {
        Self {
            track_time,
            max_rounds: 1_000,
        }
    }
}

/// Failure of a distributed pass
#[derive(Debug, Error)]
pub enum DistributedError {
    /// One carrier per subdomain is required
    #[error("expected {expected} carrier phases, got {found}")]
    CarrierMismatch {
        /// Number of subdomains
        expected: usize,
        /// Number of carriers supplied
        found: usize,
    },

    /// A processor patch names a rank that does not exist
    #[error("subdomain {from} sent a droplet to unknown subdomain {destination}")]
    UnknownSubdomain {
        /// Sending rank
        from: usize,
        /// Requested destination
        destination: usize,
    },

    /// The destination mailbox was dropped before delivery
    #[error("mailbox of subdomain {destination} is closed")]
    MailboxClosed {
        /// Destination rank
        destination: usize,
    },

    /// A subdomain worker thread panicked
    #[error("worker of subdomain {rank} panicked")]
    WorkerPanicked {
        /// Rank of the worker
        rank: usize,
    },

    /// Migrants were still in flight after the last allowed round
    #[error("{in_flight} droplet(s) still migrating after {rounds} round(s)")]
    RoundLimit {
        /// Rounds executed
        rounds: usize,
        /// Droplets awaiting delivery
        in_flight: usize,
    },

    /// A subdomain cloud rejected the pass
    #[error("subdomain {rank}: {source}")]
    Cloud {
        /// Rank of the failing subdomain
        rank: usize,
        /// Underlying cloud error
        #[source]
        source: CloudError,
    },
}

/// Totals of one distributed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Exchange rounds executed, including the initial one
    pub rounds: usize,
    /// Droplets tracked, counting a migrant once per subdomain visited
    pub tracked: usize,
    /// Droplets that finished the step
    pub retained: usize,
    /// Droplets that left through an outflow patch
    pub removed: usize,
    /// Droplets dropped after a tracking failure
    pub failed: usize,
    /// Hand-offs between subdomains
    pub migrations: usize,
}

impl PassSummary {
    fn absorb(&mut self, report: &PassReport, migrations: usize) {
        self.tracked += report.tracked;
        self.retained += report.retained;
        self.removed += report.removed;
        self.failed += report.failed;
        self.migrations += migrations;
    }
}

/// Track one time step across all subdomains.
///
/// `carriers[i]` is the carrier phase seen by `subdomains[i]`. Sources of
/// every subdomain are reset at the start of the pass.
pub fn run_pass(
    subdomains: &mut [Subdomain],
    carriers: &[CarrierPhase<'_>],
    config: &DistributedConfig,
) -> Result<PassSummary, DistributedError> {
    let n = subdomains.len();
    if carriers.len() != n {
        return Err(DistributedError::CarrierMismatch {
            expected: n,
            found: carriers.len(),
        });
    }

    let mut summary = PassSummary::default();
    let mut inboxes: Vec<Vec<TransferRecord>> = vec![Vec::new(); n];

    for round in 0..config.max_rounds {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| mpsc::channel()).unzip();

        let results: Vec<Result<(PassReport, usize), DistributedError>> = thread::scope(|scope| {
            let handles: Vec<_> = subdomains
                .iter_mut()
                .zip(carriers)
                .zip(inboxes.iter_mut().map(std::mem::take))
                .map(|((sub, carrier), incoming)| {
                    let senders = senders.clone();
                    scope.spawn(move || {
                        track_round(sub, *carrier, incoming, round, config.track_time, &senders)
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(DistributedError::WorkerPanicked { rank }))
                })
                .collect()
        });
        drop(senders);

        for result in results {
            let (report, migrations) = result?;
            summary.absorb(&report, migrations);
        }
        summary.rounds = round + 1;

        let mut in_flight = 0;
        for (inbox, receiver) in inboxes.iter_mut().zip(&receivers) {
            inbox.extend(receiver.try_iter());
            // Channel order interleaves senders; restore a fixed order
            inbox.sort_by_key(|r| r.origin_rank);
            in_flight += inbox.len();
        }

        tracing::debug!(
            "Round {}: {} tracked, {} in flight",
            round,
            summary.tracked,
            in_flight
        );

        if in_flight == 0 {
            return Ok(summary);
        }
        if round + 1 == config.max_rounds {
            return Err(DistributedError::RoundLimit {
                rounds: summary.rounds,
                in_flight,
            });
        }
    }

    Err(DistributedError::RoundLimit {
        rounds: summary.rounds,
        in_flight: inboxes.iter().map(Vec::len).sum(),
    })
}

fn track_round(
    sub: &mut Subdomain,
    carrier: CarrierPhase<'_>,
    incoming: Vec<TransferRecord>,
    round: usize,
    track_time: f64,
    mailboxes: &[Sender<TransferRecord>],
) -> Result<(PassReport, usize), DistributedError> {
    let rank = sub.rank;
    let cloud_err = |source| DistributedError::Cloud { rank, source };

    let mut report = if round == 0 {
        sub.cloud.reset_sources();
        sub.cloud
            .track_all(&sub.mesh, carrier, track_time)
            .map_err(cloud_err)?
    } else if incoming.is_empty() {
        PassReport::default()
    } else {
        sub.cloud.receive(&incoming, &sub.mesh).map_err(cloud_err)?;
        sub.cloud
            .continue_tracking(&sub.mesh, carrier, track_time)
            .map_err(cloud_err)?
    };

    let outgoing = std::mem::take(&mut report.outgoing);
    let migrations = outgoing.len();
    for migration in outgoing {
        let mailbox = mailboxes
            .get(migration.destination)
            .ok_or(DistributedError::UnknownSubdomain {
                from: rank,
                destination: migration.destination,
            })?;
        mailbox
            .send(migration.record)
            .map_err(|_| DistributedError::MailboxClosed {
                destination: migration.destination,
            })?;
    }
    Ok((report, migrations))
}
