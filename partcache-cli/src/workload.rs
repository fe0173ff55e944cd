// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, thread, time::Instant};

use clap::Parser;
use itertools::Itertools;
use partcache::{
    MetricsSnapshot, PartitionedTable, PartitionedTableBuilder, PolicyStats, StorageLevel, TableConfig, UpdateRecency,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    tier::{CountingTier, TierStats},
};

type Table = PartitionedTable<u64, CountingTier>;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Table config file in JSON. Replaces the table flags when set.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache policy strategy, e.g. `keep_all`, `lru` or `lru(128)`.
    #[arg(long, default_value = "lru")]
    policy: String,

    /// Max resident partitions of a bounded policy.
    #[arg(long, default_value_t = 64)]
    max_size: usize,

    /// Storage level reloaded partitions are persisted at.
    #[arg(long, default_value_t = StorageLevel::MemoryAndDisk)]
    storage_level: StorageLevel,

    /// Count updates as accesses.
    #[arg(long, default_value_t = false)]
    touch_on_update: bool,

    /// Partition map shards.
    #[arg(long, default_value_t = 8)]
    shards: usize,

    /// Distinct partition keys.
    #[arg(long, default_value_t = 256)]
    partitions: usize,

    /// Fraction of partitions that are hot.
    #[arg(long, default_value_t = 0.2)]
    hot_ratio: f64,

    /// Probability that an operation targets a hot partition.
    #[arg(long, default_value_t = 0.8)]
    hot_probability: f64,

    /// Share of read-through gets.
    #[arg(long, default_value_t = 0.7)]
    get_ratio: f64,

    /// Share of get-then-update operations.
    #[arg(long, default_value_t = 0.1)]
    update_ratio: f64,

    /// Share of removals. The rest are puts.
    #[arg(long, default_value_t = 0.05)]
    remove_ratio: f64,

    /// Worker threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Operations per worker.
    #[arg(long, default_value_t = 100_000)]
    ops: usize,

    /// Seed of the first worker. Worker `i` uses `seed + i`.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Strategy to switch to halfway through the workload.
    #[arg(long)]
    swap_policy: Option<String>,

    /// Pretty-print the report.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

impl Args {
    fn validate(&self) -> Result<()> {
        let ratios = [
            ("hot_ratio", self.hot_ratio),
            ("hot_probability", self.hot_probability),
            ("get_ratio", self.get_ratio),
            ("update_ratio", self.update_ratio),
            ("remove_ratio", self.remove_ratio),
        ];
        if let Some((name, value)) = ratios.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(Error::InvalidWorkload(format!("{name} must be in [0, 1], got {value}")));
        }
        if self.get_ratio + self.update_ratio + self.remove_ratio > 1.0 {
            return Err(Error::InvalidWorkload(
                "get_ratio + update_ratio + remove_ratio must not exceed 1".to_string(),
            ));
        }
        if self.partitions == 0 || self.threads == 0 {
            return Err(Error::InvalidWorkload(
                "partitions and threads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn table_config(&self) -> Result<TableConfig> {
        if let Some(path) = self.config.as_ref() {
            let config = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            return Ok(config);
        }

        let update_recency = if self.touch_on_update {
            UpdateRecency::Touch
        } else {
            UpdateRecency::Preserve
        };

        Ok(TableConfig {
            name: "workload".to_string(),
            storage_level: self.storage_level,
            cache_policy: self.policy.clone(),
            max_size: self.max_size,
            update_recency,
            shards: self.shards,
            ..Default::default()
        })
    }
}

/// Result of a workload run.
#[derive(Debug, Serialize)]
pub struct Report {
    table: String,
    policy: String,
    elapsed_ms: u128,
    ops: usize,
    resident: usize,
    cached: usize,
    hit_rate: f64,
    metrics: MetricsSnapshot,
    policy_stats: PolicyStats,
    tier: TierStats,
}

fn partition_key(index: usize) -> String {
    format!("date={}/bucket={}", index / 16, index % 16)
}

struct Worker<'a> {
    table: &'a Table,
    args: &'a Args,
    hot: usize,
    rng: StdRng,
    version: u64,
}

impl Worker<'_> {
    fn next_key(&mut self) -> String {
        let index = if self.rng.random_bool(self.args.hot_probability) {
            self.rng.random_range(0..self.hot)
        } else {
            self.rng.random_range(0..self.args.partitions)
        };
        partition_key(index)
    }

    fn run(&mut self, ops: usize) -> Result<()> {
        let get = self.args.get_ratio;
        let update = get + self.args.update_ratio;
        let remove = update + self.args.remove_ratio;

        for _ in 0..ops {
            let key = self.next_key();
            self.version += 1;

            let dice: f64 = self.rng.random();
            if dice < get {
                if self.table.get(&key)?.is_none() {
                    self.table.put(key, self.version)?;
                }
            } else if dice < update {
                if self.table.get(&key)?.is_some() {
                    self.table.update(&key, self.version)?;
                }
            } else if dice < remove {
                self.table.remove(&key);
            } else {
                self.table.put(key, self.version)?;
            }
        }

        Ok(())
    }
}

fn run_phase(workers: &mut [Worker<'_>], ops: usize) -> Result<()> {
    thread::scope(|s| {
        let handles = workers
            .iter_mut()
            .map(|worker| s.spawn(move || worker.run(ops)))
            .collect_vec();
        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| Error::Other(anyhow::anyhow!("workload worker panicked")))?
        })
    })
}

/// Run the workload described by `args` and report the table statistics.
pub fn run(args: &Args) -> Result<Report> {
    args.validate()?;

    let config = args.table_config()?;
    let tier = CountingTier::default();
    let table: Table = PartitionedTableBuilder::<u64>::new(config.name.clone())
        .with_config(config)
        .build(tier.clone())?;

    tracing::info!(
        table = table.name(),
        policy = %table.policy_kind(),
        threads = args.threads,
        ops = args.ops,
        "[workload]: start"
    );

    let hot = ((args.partitions as f64 * args.hot_ratio).ceil() as usize).clamp(1, args.partitions);
    let mut workers = (0..args.threads)
        .map(|i| Worker {
            table: &table,
            args,
            hot,
            rng: StdRng::seed_from_u64(args.seed.wrapping_add(i as u64)),
            version: 0,
        })
        .collect_vec();

    let start = Instant::now();
    match args.swap_policy.as_ref() {
        Some(strategy) => {
            let first = args.ops / 2;
            run_phase(&mut workers, first)?;
            table.configure_cache_policy(strategy, args.max_size)?;
            tracing::info!(policy = %table.policy_kind(), "[workload]: cache policy swapped");
            run_phase(&mut workers, args.ops - first)?;
        }
        None => run_phase(&mut workers, args.ops)?,
    }
    let elapsed = start.elapsed();

    let metrics = table.metrics();
    Ok(Report {
        table: table.name().to_string(),
        policy: table.policy_kind().to_string(),
        elapsed_ms: elapsed.as_millis(),
        ops: args.ops * args.threads,
        resident: table.len(),
        cached: table.cached_keys().len(),
        hit_rate: metrics.hit_rate(),
        metrics,
        policy_stats: table.policy_stats(),
        tier: tier.stats(),
    })
}
