// InfluxDB repository implementation
use crate::application::signal_repository::{LeadStatRow, SignalRepository};
use crate::domain::signal::{WaveformSample, CHANNEL_COUNT};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxRepository {
    pub fn new(host: String, token: String, database: String, retention_policy: String) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            token,
            database,
            retention_policy,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let client = reqwest::Client::new();
        let response = client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }

    fn fmt_instant(t: DateTime<Utc>) -> String {
        t.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Column-name index lookup; a missing column makes every row malformed,
/// which the row parsers treat as droppable.
fn column_index(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c == name)
}

fn parse_time(row: &[serde_json::Value], idx: usize) -> Option<DateTime<Utc>> {
    let raw = row.get(idx)?.as_str()?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_f64(row: &[serde_json::Value], idx: usize) -> Option<f64> {
    row.get(idx)?.as_f64()
}

/// Lead flags come back as 0/1 field values (or booleans on older schemas).
fn parse_flag(row: &[serde_json::Value], idx: usize) -> Option<bool> {
    let value = row.get(idx)?;
    value
        .as_bool()
        .or_else(|| value.as_f64().map(|v| v >= 0.5))
}

/// Reduce an ordered sample sequence to at most `max_points` by chunk
/// averaging: middle timestamp, mean amplitude per channel, lead flags
/// AND-combined so a dropout anywhere in the chunk survives decimation.
pub fn decimate_samples(samples: Vec<WaveformSample>, max_points: usize) -> Vec<WaveformSample> {
    if max_points == 0 || samples.len() <= max_points {
        return samples;
    }

    let bucket_size = (samples.len() as f64 / max_points as f64).ceil() as usize;
    let mut decimated = Vec::with_capacity(max_points);

    for chunk_start in (0..samples.len()).step_by(bucket_size) {
        let chunk_end = std::cmp::min(chunk_start + bucket_size, samples.len());
        let chunk = &samples[chunk_start..chunk_end];

        if chunk.is_empty() {
            continue;
        }

        let mid_idx = chunk.len() / 2;
        let mut channel_uv = [0.0; CHANNEL_COUNT];
        let mut lead_on_p = [true; CHANNEL_COUNT];
        let mut lead_on_n = [true; CHANNEL_COUNT];
        for sample in chunk {
            for i in 0..CHANNEL_COUNT {
                channel_uv[i] += sample.channel_uv[i];
                lead_on_p[i] &= sample.lead_on_p[i];
                lead_on_n[i] &= sample.lead_on_n[i];
            }
        }
        for v in &mut channel_uv {
            *v /= chunk.len() as f64;
        }

        decimated.push(WaveformSample {
            sample_time: chunk[mid_idx].sample_time,
            channel_uv,
            lead_on_p,
            lead_on_n,
        });
    }

    decimated
}

#[async_trait]
impl SignalRepository for InfluxRepository {
    async fn list_pod_ids(&self) -> Result<Vec<String>> {
        let query = "SHOW TAG VALUES FROM waveform WITH KEY = pod";
        let response = self.execute_query(query).await?;

        let mut pods = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    for value_row in &s.values {
                        if value_row.len() >= 2 {
                            if let Some(pod) = value_row[1].as_str() {
                                pods.push(pod.to_string());
                            }
                        }
                    }
                }
            }
        }

        Ok(pods)
    }

    async fn available_days(&self, pod: &str) -> Result<Vec<NaiveDate>> {
        // One count per calendar day; fill(none) drops days with no data
        let query = format!(
            "SELECT count(channel_1) AS n FROM waveform WHERE pod = '{}' GROUP BY time(1d) fill(none)",
            pod
        );

        tracing::debug!("Executing day availability query: {}", query);
        let response = self.execute_query(&query).await?;

        let mut days = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    let time_idx = match column_index(&s.columns, "time") {
                        Some(idx) => idx,
                        None => continue,
                    };
                    let count_idx = column_index(&s.columns, "n");
                    for value_row in &s.values {
                        let Some(time) = parse_time(value_row, time_idx) else {
                            tracing::warn!("dropping malformed day availability row");
                            continue;
                        };
                        let has_data = count_idx
                            .and_then(|idx| parse_f64(value_row, idx))
                            .is_some_and(|n| n > 0.0);
                        if has_data {
                            days.push(time.date_naive());
                        }
                    }
                }
            }
        }

        tracing::debug!("Found {} recorded days for pod {}", days.len(), pod);
        Ok(days)
    }

    async fn lead_stat_rows(
        &self,
        pod: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_secs: i64,
    ) -> Result<Vec<LeadStatRow>> {
        let selects: Vec<String> = (1..=CHANNEL_COUNT)
            .map(|i| {
                format!(
                    "mean(lead_on_p_{i}) AS lead_on_p_{i}, mean(lead_on_n_{i}) AS lead_on_n_{i}, mean(quality_{i}) AS quality_{i}"
                )
            })
            .collect();
        let query = format!(
            "SELECT {} FROM lead_quality WHERE pod = '{}' AND time >= '{}' AND time < '{}' GROUP BY time({}s) fill(none)",
            selects.join(", "),
            pod,
            Self::fmt_instant(start),
            Self::fmt_instant(end),
            bucket_secs
        );

        tracing::debug!("Executing bucket aggregation query: {}", query);
        let response = self.execute_query(&query).await?;

        let mut rows = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    let Some(time_idx) = column_index(&s.columns, "time") else {
                        continue;
                    };
                    for value_row in &s.values {
                        match parse_lead_stat_row(&s.columns, value_row, time_idx) {
                            Some(row) => rows.push(row),
                            None => {
                                tracing::warn!("dropping malformed lead stat row for pod {}", pod)
                            }
                        }
                    }
                }
            }
        }

        Ok(rows)
    }

    async fn waveform_rows(
        &self,
        pod: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_points: usize,
    ) -> Result<Vec<WaveformSample>> {
        // Decimate in the query itself: mean amplitude per step, min() on
        // the 0/1 lead flags so any dropout in a step reads as lead-off
        let duration_ms = (end - start).num_milliseconds().max(1);
        let step_ms = (duration_ms / max_points.max(1) as i64).max(1);
        let selects: Vec<String> = (1..=CHANNEL_COUNT)
            .map(|i| {
                format!(
                    "mean(channel_{i}) AS channel_{i}, min(lead_on_p_{i}) AS lead_on_p_{i}, min(lead_on_n_{i}) AS lead_on_n_{i}"
                )
            })
            .collect();
        let query = format!(
            "SELECT {} FROM waveform WHERE pod = '{}' AND time >= '{}' AND time < '{}' GROUP BY time({}ms) fill(none)",
            selects.join(", "),
            pod,
            Self::fmt_instant(start),
            Self::fmt_instant(end),
            step_ms
        );

        tracing::debug!("Executing waveform downsample query: {}", query);
        let response = self.execute_query(&query).await?;

        let mut samples = Vec::new();
        if let Some(result) = response.results.first() {
            if let Some(series) = &result.series {
                for s in series {
                    let Some(time_idx) = column_index(&s.columns, "time") else {
                        continue;
                    };
                    for value_row in &s.values {
                        match parse_waveform_row(&s.columns, value_row, time_idx) {
                            Some(sample) => samples.push(sample),
                            None => {
                                tracing::warn!("dropping malformed waveform row for pod {}", pod)
                            }
                        }
                    }
                }
            }
        }

        // Guard against the step rounding overshooting the budget
        Ok(decimate_samples(samples, max_points))
    }
}

fn parse_lead_stat_row(
    columns: &[String],
    row: &[serde_json::Value],
    time_idx: usize,
) -> Option<LeadStatRow> {
    let time_bucket = parse_time(row, time_idx)?;
    let mut lead_on_p = [0.0; CHANNEL_COUNT];
    let mut lead_on_n = [0.0; CHANNEL_COUNT];
    let mut quality = [0.0; CHANNEL_COUNT];
    for i in 0..CHANNEL_COUNT {
        lead_on_p[i] = parse_f64(row, column_index(columns, &format!("lead_on_p_{}", i + 1))?)?;
        lead_on_n[i] = parse_f64(row, column_index(columns, &format!("lead_on_n_{}", i + 1))?)?;
        quality[i] = parse_f64(row, column_index(columns, &format!("quality_{}", i + 1))?)?;
    }
    Some(LeadStatRow {
        time_bucket,
        lead_on_p,
        lead_on_n,
        quality,
    })
}

fn parse_waveform_row(
    columns: &[String],
    row: &[serde_json::Value],
    time_idx: usize,
) -> Option<WaveformSample> {
    let sample_time = parse_time(row, time_idx)?;
    let mut channel_uv = [0.0; CHANNEL_COUNT];
    let mut lead_on_p = [false; CHANNEL_COUNT];
    let mut lead_on_n = [false; CHANNEL_COUNT];
    for i in 0..CHANNEL_COUNT {
        channel_uv[i] = parse_f64(row, column_index(columns, &format!("channel_{}", i + 1))?)?;
        lead_on_p[i] = parse_flag(row, column_index(columns, &format!("lead_on_p_{}", i + 1))?)?;
        lead_on_n[i] = parse_flag(row, column_index(columns, &format!("lead_on_n_{}", i + 1))?)?;
    }
    Some(WaveformSample {
        sample_time,
        channel_uv,
        lead_on_p,
        lead_on_n,
    })
}
