//! Scanned-code grammar and resolution to ticket ids.
//!
//! Grammars, in priority order:
//! - `TICKETS:<id>,<id>,...`: explicit ids, one scan for several tickets
//! - `E<eventId>-S<seatId>-B<billId>`: seat of a purchase, looked up
//! - `<id>`: a bare ticket id
//! - anything else: the ticket's opaque code, looked up

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::store::{StoreError, TicketStore};

const BATCH_PREFIX: &str = "TICKETS:";
pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCode {
    ExplicitIds(Vec<i64>),
    Composite {
        event_id: i64,
        seat_id: i64,
        bill_id: i64,
        /// Scanned text, kept for the opaque-code fallback.
        raw: String,
    },
    BareId(i64),
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("Mã vé không được để trống")]
    Blank,

    #[error("Danh sách vé chứa ID không hợp lệ: '{0}'")]
    MalformedId(String),

    #[error("Danh sách vé không có ID nào")]
    EmptyBatch,

    #[error("Chỉ được quét tối đa {max} vé mỗi lần, nhận được {count}")]
    BatchTooLarge { count: usize, max: usize },
}

impl ScanCode {
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(CodeError::Blank);
        }

        if let Some(list) = strip_prefix_ignore_case(code, BATCH_PREFIX) {
            return parse_batch(list).map(ScanCode::ExplicitIds);
        }
        if let Some((event_id, seat_id, bill_id)) = parse_composite(code) {
            return Ok(ScanCode::Composite {
                event_id,
                seat_id,
                bill_id,
                raw: code.to_string(),
            });
        }
        if let Some(id) = positive_id(code) {
            return Ok(ScanCode::BareId(id));
        }
        Ok(ScanCode::Opaque(code.to_string()))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn positive_id(s: &str) -> Option<i64> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok().filter(|id| *id > 0)
}

fn parse_batch(list: &str) -> Result<Vec<i64>, CodeError> {
    let mut ids: Vec<i64> = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = positive_id(part).ok_or_else(|| CodeError::MalformedId(part.to_string()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    match ids.len() {
        0 => Err(CodeError::EmptyBatch),
        n if n > MAX_BATCH_SIZE => Err(CodeError::BatchTooLarge {
            count: n,
            max: MAX_BATCH_SIZE,
        }),
        _ => Ok(ids),
    }
}

fn parse_composite(code: &str) -> Option<(i64, i64, i64)> {
    let mut parts = code.split('-');
    let event_id = tagged(parts.next()?, 'E')?;
    let seat_id = tagged(parts.next()?, 'S')?;
    let bill_id = tagged(parts.next()?, 'B')?;
    if parts.next().is_some() {
        return None;
    }
    Some((event_id, seat_id, bill_id))
}

fn tagged(part: &str, tag: char) -> Option<i64> {
    let mut chars = part.chars();
    let first = chars.next()?;
    if !first.eq_ignore_ascii_case(&tag) {
        return None;
    }
    positive_id(chars.as_str())
}

/// Turns a scanned code into concrete ticket ids. An empty result means the
/// code matched nothing.
#[derive(Clone)]
pub struct TicketCodeResolver {
    store: Arc<dyn TicketStore>,
}

impl TicketCodeResolver {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, code: &ScanCode) -> Result<Vec<i64>, StoreError> {
        let ids = match code {
            ScanCode::ExplicitIds(ids) => ids.clone(),
            ScanCode::BareId(id) => vec![*id],
            ScanCode::Composite {
                event_id,
                seat_id,
                bill_id,
                raw,
            } => {
                match self
                    .store
                    .find_ticket_by_seat(*event_id, *seat_id, *bill_id)
                    .await?
                {
                    Some(id) => vec![id],
                    // A printed code may look composite without being one.
                    None => self.by_opaque_code(raw).await?,
                }
            }
            ScanCode::Opaque(raw) => self.by_opaque_code(raw).await?,
        };

        debug!(?code, ?ids, "Resolved scan code");
        Ok(ids)
    }

    async fn by_opaque_code(&self, raw: &str) -> Result<Vec<i64>, StoreError> {
        Ok(self.store.find_ticket_by_code(raw).await?.into_iter().collect())
    }
}
