//! Wire models for the table service and the calculator service.
//!
//! Every message is a JSON object discriminated by its `type` field. Requests
//! and success responses carry a `request_id`; error responses do not.
//! Row contents, keys and insert payloads are opaque [`serde_json::Value`]s
//! that are passed through unexamined.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Table Requests
// =============================================================================

/// Sort direction for [`ListRowsRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Column ordering applied to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub order: SortOrder,
}

/// 1-based page selection. The peer rejects page number zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRowsRequest {
    pub table: String,
    /// Columns to return. Empty selects every column.
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRowRequest {
    pub table: String,
    pub key: Value,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRowRequest {
    pub table: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInsertRowRequest {
    pub table: String,
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Partial update: `data` holds only the columns to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowRequest {
    pub table: String,
    pub key: Value,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRowRequest {
    pub table: String,
    pub key: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A request to the table service.
///
/// Serializes as `{"type": "<Variant>", "table": ..., ..., "request_id": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    ListRows(ListRowsRequest),
    GetRow(GetRowRequest),
    InsertRow(InsertRowRequest),
    BatchInsertRow(BatchInsertRowRequest),
    UpdateRow(UpdateRowRequest),
    DeleteRow(DeleteRowRequest),
}

impl Request {
    /// List every row of `table`.
    pub fn list_rows(table: impl Into<String>) -> Self {
        Request::ListRows(ListRowsRequest {
            table: table.into(),
            select: Vec::new(),
            sort: None,
            page: None,
            request_id: None,
        })
    }

    /// Fetch the row of `table` whose primary key is `key`.
    pub fn get_row(table: impl Into<String>, key: impl Into<Value>) -> Self {
        Request::GetRow(GetRowRequest {
            table: table.into(),
            key: key.into(),
            select: Vec::new(),
            request_id: None,
        })
    }

    pub fn insert_row(table: impl Into<String>, data: Value) -> Self {
        Request::InsertRow(InsertRowRequest {
            table: table.into(),
            data,
            request_id: None,
        })
    }

    pub fn batch_insert_rows(table: impl Into<String>, data: Vec<Value>) -> Self {
        Request::BatchInsertRow(BatchInsertRowRequest {
            table: table.into(),
            data,
            request_id: None,
        })
    }

    pub fn update_row(table: impl Into<String>, key: impl Into<Value>, data: Value) -> Self {
        Request::UpdateRow(UpdateRowRequest {
            table: table.into(),
            key: key.into(),
            data,
            request_id: None,
        })
    }

    pub fn delete_row(table: impl Into<String>, key: impl Into<Value>) -> Self {
        Request::DeleteRow(DeleteRowRequest {
            table: table.into(),
            key: key.into(),
            request_id: None,
        })
    }

    /// Builder method to restrict the returned columns.
    ///
    /// Only `ListRows` and `GetRow` accept a selection; other variants are
    /// returned unchanged.
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        match &mut self {
            Request::ListRows(req) => req.select = columns,
            Request::GetRow(req) => req.select = columns,
            _ => {}
        }
        self
    }

    /// Builder method to sort a listing. Ignored by other variants.
    pub fn with_sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        if let Request::ListRows(req) = &mut self {
            req.sort = Some(Sort {
                column: column.into(),
                order,
            });
        }
        self
    }

    /// Builder method to paginate a listing. Ignored by other variants.
    pub fn with_page(mut self, number: u64, size: u64) -> Self {
        if let Request::ListRows(req) = &mut self {
            req.page = Some(Page { number, size });
        }
        self
    }

    /// Builder method to pin the request identifier.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        *self.request_id_mut() = Some(request_id.into());
        self
    }

    /// Wire tag of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ListRows(_) => "ListRows",
            Request::GetRow(_) => "GetRow",
            Request::InsertRow(_) => "InsertRow",
            Request::BatchInsertRow(_) => "BatchInsertRow",
            Request::UpdateRow(_) => "UpdateRow",
            Request::DeleteRow(_) => "DeleteRow",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Request::ListRows(req) => &req.table,
            Request::GetRow(req) => &req.table,
            Request::InsertRow(req) => &req.table,
            Request::BatchInsertRow(req) => &req.table,
            Request::UpdateRow(req) => &req.table,
            Request::DeleteRow(req) => &req.table,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Request::ListRows(req) => req.request_id.as_deref(),
            Request::GetRow(req) => req.request_id.as_deref(),
            Request::InsertRow(req) => req.request_id.as_deref(),
            Request::BatchInsertRow(req) => req.request_id.as_deref(),
            Request::UpdateRow(req) => req.request_id.as_deref(),
            Request::DeleteRow(req) => req.request_id.as_deref(),
        }
    }

    pub(crate) fn request_id_mut(&mut self) -> &mut Option<String> {
        match self {
            Request::ListRows(req) => &mut req.request_id,
            Request::GetRow(req) => &mut req.request_id,
            Request::InsertRow(req) => &mut req.request_id,
            Request::BatchInsertRow(req) => &mut req.request_id,
            Request::UpdateRow(req) => &mut req.request_id,
            Request::DeleteRow(req) => &mut req.request_id,
        }
    }
}

// =============================================================================
// Table Responses
// =============================================================================

/// A successful reply from the table service.
///
/// Mirrors the [`Request`] variant it answers and echoes its `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    ListRows {
        table: String,
        rows: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    GetRow {
        table: String,
        row: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    InsertRow {
        table: String,
        inserted_rows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    BatchInsertRow {
        table: String,
        inserted_rows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    UpdateRow {
        table: String,
        updated_rows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    DeleteRow {
        table: String,
        deleted_rows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl Response {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Response::ListRows { request_id, .. }
            | Response::GetRow { request_id, .. }
            | Response::InsertRow { request_id, .. }
            | Response::BatchInsertRow { request_id, .. }
            | Response::UpdateRow { request_id, .. }
            | Response::DeleteRow { request_id, .. } => request_id.as_deref(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Response::ListRows { table, .. }
            | Response::GetRow { table, .. }
            | Response::InsertRow { table, .. }
            | Response::BatchInsertRow { table, .. }
            | Response::UpdateRow { table, .. }
            | Response::DeleteRow { table, .. } => table,
        }
    }
}

/// A protocol or domain failure reported by the table service.
///
/// Carries no `request_id`; see [`crate::ipc`] for how these are matched to
/// calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ErrorResponse {
    BadRequest { message: String },
    NonTextMessage,
    TableNotFound { table: String },
    ColumnsNotFound { columns: Vec<String> },
    SortColumnNotFound { column: String },
    PageNumberCanNotBeZero,
    RowNotFound,
    DatabaseError,
}

// =============================================================================
// Calculator Vocabulary
// =============================================================================

/// Requests understood by the calculator service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculatorRequest {
    Add {
        x: u8,
        y: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    Sub {
        x: u8,
        y: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    SetVar {
        name: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    GetVar {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl CalculatorRequest {
    pub fn add(x: u8, y: u8) -> Self {
        CalculatorRequest::Add {
            x,
            y,
            request_id: None,
        }
    }

    pub fn sub(x: u8, y: u8) -> Self {
        CalculatorRequest::Sub {
            x,
            y,
            request_id: None,
        }
    }

    pub fn set_var(name: impl Into<String>, value: impl Into<String>) -> Self {
        CalculatorRequest::SetVar {
            name: name.into(),
            value: value.into(),
            request_id: None,
        }
    }

    pub fn get_var(name: impl Into<String>) -> Self {
        CalculatorRequest::GetVar {
            name: name.into(),
            request_id: None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            CalculatorRequest::Add { request_id, .. }
            | CalculatorRequest::Sub { request_id, .. }
            | CalculatorRequest::SetVar { request_id, .. }
            | CalculatorRequest::GetVar { request_id, .. } => request_id.as_deref(),
        }
    }

    pub(crate) fn request_id_mut(&mut self) -> &mut Option<String> {
        match self {
            CalculatorRequest::Add { request_id, .. }
            | CalculatorRequest::Sub { request_id, .. }
            | CalculatorRequest::SetVar { request_id, .. }
            | CalculatorRequest::GetVar { request_id, .. } => request_id,
        }
    }
}

/// Replies from the calculator service. Arithmetic wraps at `u8` bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculatorResponse {
    AddResult {
        result: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    SubResult {
        result: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    SetVarResult {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    GetVarResult {
        name: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl CalculatorResponse {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            CalculatorResponse::AddResult { request_id, .. }
            | CalculatorResponse::SubResult { request_id, .. }
            | CalculatorResponse::SetVarResult { request_id, .. }
            | CalculatorResponse::GetVarResult { request_id, .. } => request_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculatorError {
    BadRequest { message: String },
    NonTextMessage,
    VariableNotFound { name: String },
}
