//! 图片同步指标收集模块
//!
//! 记录解析、去重、回调分发与插件通道的运行指标，并提供内存聚合器用于输出摘要。

use std::collections::HashMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次新的解析（去重后真正启动的那一次）
pub fn record_resolution_started(source_type: &str) {
    counter!(
        "imagesync_resolutions_started_total",
        "source_type" => source_type.to_string()
    )
    .increment(1);
}

/// 记录合并到已有解析上的请求
pub fn record_request_joined(source_type: &str) {
    counter!(
        "imagesync_requests_joined_total",
        "source_type" => source_type.to_string()
    )
    .increment(1);
}

/// 记录快速路径（已同步，直接回调）
pub fn record_fast_path(source_type: &str) {
    counter!(
        "imagesync_fast_path_total",
        "source_type" => source_type.to_string()
    )
    .increment(1);
}

/// 记录解析成功及耗时
pub fn record_resolution_finished(source_type: &str, resolver: &str, elapsed: Duration) {
    counter!(
        "imagesync_resolutions_total",
        "source_type" => source_type.to_string(),
        "resolver" => resolver.to_string(),
        "status" => "success"
    )
    .increment(1);

    histogram!(
        "imagesync_resolution_latency_ms",
        "source_type" => source_type.to_string()
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录解析失败（失败只记录，不重试）
pub fn record_resolution_failed(source_type: &str, error_kind: &str) {
    counter!(
        "imagesync_resolutions_total",
        "source_type" => source_type.to_string(),
        "status" => "failure",
        "error" => error_kind.to_string()
    )
    .increment(1);
}

/// 记录一次回调扇出
pub fn record_fan_out(callbacks: usize) {
    counter!("imagesync_callbacks_total").increment(callbacks as u64);
    histogram!("imagesync_fan_out_size").record(callbacks as f64);
}

/// 记录找不到登记项的完成信号（内部一致性故障）
pub fn record_orphan_signal() {
    counter!("imagesync_orphan_signals_total").increment(1);
}

/// 记录在途解析数量
pub fn record_in_flight(count: usize) {
    gauge!("imagesync_in_flight").set(count as f64);
}

/// 记录插件通道状态变化
pub fn record_channel_transition(plugin: &str, state: &str) {
    counter!(
        "imagesync_channel_transitions_total",
        "plugin" => plugin.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// 记录插件通道等待队列深度
pub fn record_pending_depth(plugin: &str, depth: usize) {
    gauge!(
        "imagesync_channel_pending",
        "plugin" => plugin.to_string()
    )
    .set(depth as f64);
}

/// 解析耗时聚合器
///
/// 在内存中按来源类型聚合耗时，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ResolutionStatsAggregator {
    /// 成功次数
    pub succeeded: u64,

    /// 失败次数
    pub failed: u64,

    /// 各来源类型耗时统计 (ms)
    pub latency_stats: HashMap<String, RunningStats>,
}

impl ResolutionStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次解析结果
    pub fn update(&mut self, source_type: &str, synchronized: bool, elapsed: Duration) {
        if synchronized {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.latency_stats
            .entry(source_type.to_string())
            .or_default()
            .push(elapsed.as_secs_f64() * 1000.0);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> ResolutionSummary {
        let total = self.succeeded + self.failed;
        ResolutionSummary {
            succeeded: self.succeeded,
            failed: self.failed,
            failure_rate: if total > 0 {
                self.failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: self
                .latency_stats
                .iter()
                .map(|(k, v)| (k.clone(), StatsSummary::from(v)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 解析摘要
#[derive(Debug, Clone, Default)]
pub struct ResolutionSummary {
    pub succeeded: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub latency_ms: HashMap<String, StatsSummary>,
}

impl std::fmt::Display for ResolutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Resolution Summary ===")?;
        writeln!(f, "Synchronized: {}", self.succeeded)?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;

        let mut kinds: Vec<_> = self.latency_ms.iter().collect();
        kinds.sort_by(|a, b| a.0.cmp(b.0));
        for (kind, stats) in kinds {
            writeln!(f, "Latency [{}] (ms): {}", kind, stats)?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
