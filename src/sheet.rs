// ── Sheet Transport & Syncer (C11) ──────────────────────────────────────
// `SheetTransport` is the seam both the syncer (below) and the feedback
// reader (`feedback.rs`) call through; `GoogleSheetsClient` is a minimal
// `reqwest`-based implementation against the Sheets API v4 `values`
// endpoints, taking a pre-issued bearer token — OAuth refresh is an
// external collaborator's concern (out of scope).

use crate::atoms::constants::{SHEET_GRID_ID, SHEET_HEADER, SHEET_RANGE, SHEET_RESOLUTION_COLUMN_INDEX, SHEET_WRITE_CHUNK_SIZE};
use crate::atoms::error::{JobSyncError, JobSyncResult};
use crate::atoms::types::Resolution;
use crate::store::companies::Company;
use async_trait::async_trait;
use std::collections::HashMap;

/// What both the syncer and the feedback reader need from an external
/// spreadsheet: read a rectangular range of string cells, append rows,
/// and update a targeted range.
#[async_trait]
pub trait SheetTransport: Send + Sync {
    async fn read_values(&self, range: &str) -> JobSyncResult<Vec<Vec<String>>>;
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> JobSyncResult<()>;
    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> JobSyncResult<()>;
    /// Provisions a single spreadsheet column with a `ONE_OF_LIST`
    /// validation rule restricting entry to `allowed_values`. Goes through
    /// `batchUpdate` rather than the `values` endpoints the rest of this
    /// trait uses, since validation rules are sheet metadata, not cell
    /// values.
    async fn set_enum_validation(&self, grid_sheet_id: i64, column_index: i64, allowed_values: &[&str]) -> JobSyncResult<()>;
}

pub struct GoogleSheetsClient {
    client: reqwest::Client,
    sheet_id: String,
    bearer_token: String,
}

impl GoogleSheetsClient {
    pub fn new(sheet_id: String, bearer_token: String) -> Self {
        GoogleSheetsClient { client: reqwest::Client::new(), sheet_id, bearer_token }
    }

    fn values_url(&self, range: &str) -> String {
        format!("https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}", self.sheet_id, urlencoding::encode(range))
    }

    fn batch_update_url(&self) -> String {
        format!("https://sheets.googleapis.com/v4/spreadsheets/{}:batchUpdate", self.sheet_id)
    }
}

#[async_trait]
impl SheetTransport for GoogleSheetsClient {
    async fn read_values(&self, range: &str) -> JobSyncResult<Vec<Vec<String>>> {
        let response = self.client.get(self.values_url(range)).bearer_auth(&self.bearer_token).send().await?;
        if !response.status().is_success() {
            return Err(JobSyncError::Sheet(format!("read {range} failed with status {}", response.status())));
        }
        let body: serde_json::Value = response.json().await?;
        let rows = body["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| row.as_array().map(|cells| cells.iter().map(cell_to_string).collect()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> JobSyncResult<()> {
        let url = format!("{}:append?valueInputOption=RAW", self.values_url(range));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JobSyncError::Sheet(format!("append to {range} failed with status {}", response.status())));
        }
        Ok(())
    }

    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> JobSyncResult<()> {
        let url = format!("{}?valueInputOption=RAW", self.values_url(range));
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JobSyncError::Sheet(format!("update {range} failed with status {}", response.status())));
        }
        Ok(())
    }

    async fn set_enum_validation(&self, grid_sheet_id: i64, column_index: i64, allowed_values: &[&str]) -> JobSyncResult<()> {
        let body = serde_json::json!({
            "requests": [{
                "setDataValidation": {
                    "range": {
                        "sheetId": grid_sheet_id,
                        "startRowIndex": 1,
                        "startColumnIndex": column_index,
                        "endColumnIndex": column_index + 1,
                    },
                    "rule": {
                        "condition": {
                            "type": "ONE_OF_LIST",
                            "values": allowed_values.iter().map(|v| serde_json::json!({ "userEnteredValue": v })).collect::<Vec<_>>(),
                        },
                        "strict": true,
                        "showCustomUi": true,
                    },
                },
            }],
        });
        let response = self.client.post(self.batch_update_url()).bearer_auth(&self.bearer_token).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(JobSyncError::Sheet(format!("set_enum_validation failed with status {}", response.status())));
        }
        Ok(())
    }
}

fn cell_to_string(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncCounters {
    pub appended: usize,
    pub updated: usize,
}

/// Outbound sync of store company metrics into the curated sheet
///. A transport failure is logged and returned as an
/// error but does not panic — the caller (scheduler) treats it as
/// best-effort / non-fatal to the ingestion run.
pub async fn sync_companies(store: &crate::store::Store, transport: &dyn SheetTransport) -> JobSyncResult<SyncCounters> {
    let header_row = transport.read_values(&format!("{}1:J1", SHEET_RANGE.split('!').next().unwrap_or("Companies"))).await?;
    match header_row.first() {
        None => {
            transport
                .append_rows(
                    &format!("{}1:J1", SHEET_RANGE.split('!').next().unwrap_or("Companies")),
                    vec![SHEET_HEADER.iter().map(|s| s.to_string()).collect()],
                )
                .await?;
            let allowed: Vec<&str> = [
                Resolution::Pending,
                Resolution::InProgress,
                Resolution::HighInterest,
                Resolution::AlreadyRevolut,
                Resolution::Accepted,
                Resolution::Rejected,
            ]
            .iter()
            .map(|r| r.as_str())
            .collect();
            transport.set_enum_validation(SHEET_GRID_ID, SHEET_RESOLUTION_COLUMN_INDEX, &allowed).await?;
        }
        Some(row) => {
            let trimmed: Vec<&str> = row.iter().map(|c| c.trim()).collect();
            if trimmed != SHEET_HEADER.to_vec() {
                return Err(JobSyncError::Sheet(format!("sheet header mismatch: expected {:?}, found {:?}", SHEET_HEADER, trimmed)));
            }
        }
    }

    let existing_rows = transport.read_values(SHEET_RANGE).await?;
    let mut row_by_company_id: HashMap<i64, usize> = HashMap::new();
    for (idx, row) in existing_rows.iter().enumerate().skip(1) {
        if let Some(id) = row.first().and_then(|v| v.parse::<i64>().ok()) {
            row_by_company_id.insert(id, idx + 1); // 1-based sheet row number
        }
    }

    let companies = store.list_all_companies()?;
    let mut to_append = Vec::new();
    let mut updates: Vec<(i64, Vec<String>)> = Vec::new();

    for company in &companies {
        let metric_cells = metric_columns(company);
        match row_by_company_id.get(&company.id) {
            Some(&row_num) => updates.push((row_num as i64, metric_cells)),
            None => to_append.push(company_row(company)),
        }
    }

    let mut counters = SyncCounters::default();
    for chunk in to_append.chunks(SHEET_WRITE_CHUNK_SIZE) {
        transport.append_rows(SHEET_RANGE, chunk.to_vec()).await?;
        counters.appended += chunk.len();
    }

    for (row_num, cells) in &updates {
        transport.update_range(&format!("Companies!D{row_num}:J{row_num}"), vec![cells.clone()]).await?;
        counters.updated += 1;
    }

    Ok(counters)
}

fn company_row(company: &Company) -> Vec<String> {
    let mut row = vec![
        company.id.to_string(),
        company.display_name.clone().unwrap_or_default(),
        Resolution::Pending.as_str().to_string(),
    ];
    row.extend(metric_columns(company));
    row
}

/// Columns D–J (1-based spreadsheet lettering), metric fields only —
/// columns A–C (id/name/resolution) are never touched by a metric-only
/// update.
fn metric_columns(company: &Company) -> Vec<String> {
    vec![
        format_decimal(Some(company.max_score as f64)),
        company.strong_offer_count.to_string(),
        company.unique_offer_count.to_string(),
        company.offer_count.to_string(),
        format_decimal(company.avg_strong_score),
        company.top_category_id.clone().unwrap_or_default(),
        format_date(company.last_strong_at.as_deref()),
    ]
}

fn format_decimal(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => String::new(),
    }
}

fn format_date(rfc3339: Option<&str>) -> String {
    rfc3339
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{resolve_key, EnrichmentCandidate};
    use crate::store::Store;
    use std::sync::Mutex as StdMutex;

    struct FakeSheet {
        header_written: StdMutex<bool>,
        rows: StdMutex<Vec<Vec<String>>>,
        validations: StdMutex<Vec<(i64, i64, Vec<String>)>>,
    }

    impl FakeSheet {
        fn new() -> Self {
            FakeSheet { header_written: StdMutex::new(false), rows: StdMutex::new(vec![]), validations: StdMutex::new(vec![]) }
        }
    }

    #[async_trait]
    impl SheetTransport for FakeSheet {
        async fn read_values(&self, range: &str) -> JobSyncResult<Vec<Vec<String>>> {
            if range.contains("1:J1") {
                return Ok(if *self.header_written.lock().unwrap() {
                    vec![SHEET_HEADER.iter().map(|s| s.to_string()).collect()]
                } else {
                    vec![]
                });
            }
            let mut out = vec![SHEET_HEADER.iter().map(|s| s.to_string()).collect::<Vec<_>>()];
            out.extend(self.rows.lock().unwrap().clone());
            Ok(out)
        }

        async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> JobSyncResult<()> {
            if range.contains("1:J1") {
                *self.header_written.lock().unwrap() = true;
            } else {
                self.rows.lock().unwrap().extend(rows);
            }
            Ok(())
        }

        async fn update_range(&self, _range: &str, _rows: Vec<Vec<String>>) -> JobSyncResult<()> {
            Ok(())
        }

        async fn set_enum_validation(&self, grid_sheet_id: i64, column_index: i64, allowed_values: &[&str]) -> JobSyncResult<()> {
            self.validations.lock().unwrap().push((grid_sheet_id, column_index, allowed_values.iter().map(|s| s.to_string()).collect()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_sync_writes_header_then_appends_new_companies() {
        let store = Store::open_in_memory().unwrap();
        let payload = crate::atoms::types::CompanyPayload {
            name: Some("Acme".into()),
            normalized_name: None,
            website_url: Some("https://acme.com".into()),
            website_domain: Some("acme.com".into()),
        };
        let key = resolve_key(&payload).unwrap();
        store.find_or_create_company(&key, &EnrichmentCandidate::from_payload(&payload)).unwrap();

        let sheet = FakeSheet::new();
        let counters = sync_companies(&store, &sheet).await.unwrap();
        assert_eq!(counters.appended, 1);
        assert_eq!(counters.updated, 0);
        assert!(*sheet.header_written.lock().unwrap());

        let validations = sheet.validations.lock().unwrap();
        assert_eq!(validations.len(), 1);
        let (grid_sheet_id, column_index, allowed) = &validations[0];
        assert_eq!(*grid_sheet_id, SHEET_GRID_ID);
        assert_eq!(*column_index, SHEET_RESOLUTION_COLUMN_INDEX);
        assert!(allowed.contains(&Resolution::Rejected.as_str().to_string()));
        assert_eq!(allowed.len(), 6);
    }

    #[tokio::test]
    async fn mismatched_header_fails_fast() {
        struct WrongHeaderSheet;
        #[async_trait]
        impl SheetTransport for WrongHeaderSheet {
            async fn read_values(&self, _range: &str) -> JobSyncResult<Vec<Vec<String>>> {
                Ok(vec![vec!["wrong".to_string()]])
            }
            async fn append_rows(&self, _range: &str, _rows: Vec<Vec<String>>) -> JobSyncResult<()> {
                Ok(())
            }
            async fn update_range(&self, _range: &str, _rows: Vec<Vec<String>>) -> JobSyncResult<()> {
                Ok(())
            }

            async fn set_enum_validation(&self, _grid_sheet_id: i64, _column_index: i64, _allowed_values: &[&str]) -> JobSyncResult<()> {
                Ok(())
            }
        }

        let store = Store::open_in_memory().unwrap();
        let result = sync_companies(&store, &WrongHeaderSheet).await;
        assert!(matches!(result, Err(JobSyncError::Sheet(_))));
    }
}
