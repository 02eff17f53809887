use crate::{wire, Col, Row, Value, XdbError};

pub(crate) fn decode_cols(cols: Vec<wire::Col>) -> Vec<Col> {
    cols.into_iter()
        .map(|col| Col::named(col.name.unwrap_or_default()))
        .collect()
}

pub(crate) fn decode_rows(rows: Vec<Vec<wire::Value>>) -> Result<Vec<Row>, XdbError> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, XdbError>>()
                .map(Row::new)
        })
        .collect()
}

pub(crate) fn decode_value(value: wire::Value) -> Result<Value, XdbError> {
    match value {
        wire::Value::Null {} => Ok(Value::Null),
        wire::Value::Integer { value } => value
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|err| XdbError::Decode(format!("invalid integer value '{value}': {err}"))),
        wire::Value::Float { value } => value
            .as_f64()
            .filter(|parsed| parsed.is_finite())
            .map(Value::Float)
            .ok_or_else(|| XdbError::Decode(format!("unsupported float value '{value}'"))),
        wire::Value::Text { value } => Ok(Value::Text(value)),
        wire::Value::Blob { base64 } => Ok(Value::BlobBase64(base64)),
    }
}

/// Unwraps the execute result of pipeline entry `request_index`.
pub(crate) fn into_execute_result(
    result: wire::PipelineResult,
    request_index: usize,
) -> Result<wire::ExecuteResult, XdbError> {
    match expect_response(result, request_index, "execute")? {
        Some(execute) => Ok(execute),
        None => Err(XdbError::Decode(format!(
            "missing execute result payload at request {request_index}"
        ))),
    }
}

pub(crate) fn ensure_close_success(
    result: wire::PipelineResult,
    request_index: usize,
) -> Result<(), XdbError> {
    expect_response(result, request_index, "close").map(|_| ())
}

fn expect_response(
    result: wire::PipelineResult,
    request_index: usize,
    expected_kind: &str,
) -> Result<Option<wire::ExecuteResult>, XdbError> {
    match result.kind.as_str() {
        "ok" => {
            let response = result.response.ok_or_else(|| {
                XdbError::Decode(format!(
                    "missing response payload for request {request_index}"
                ))
            })?;
            if response.kind != expected_kind {
                return Err(XdbError::Decode(format!(
                    "expected {expected_kind} response at request {request_index}, got '{}'",
                    response.kind
                )));
            }
            Ok(response.result)
        }
        "error" => {
            let error = result.error.ok_or_else(|| {
                XdbError::Decode(format!(
                    "missing error payload for request {request_index}"
                ))
            })?;
            Err(XdbError::Pipeline {
                request_index,
                message: error.message,
                code: error.code,
            })
        }
        other => Err(XdbError::Decode(format!(
            "unknown pipeline result type '{other}' at request {request_index}"
        ))),
    }
}
