use super::ERROR_OPCODE;
use super::error::ProtoError;

/// Payload attached to a command or response. The wire grammar encodes
/// each variant differently, so decode never has to guess a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Absent,
    Integer(i64),
    Text(String),
}

/// One host-to-device command: a single-character opcode plus payload.
/// Immutable once built; `encode` uppercases the opcode.
#[derive(Debug, Clone)]
pub struct Command {
    pub opcode: char,
    pub payload: Payload,
}

impl Command {
    pub fn numeric(opcode: char, value: i64) -> Self {
        Self {
            opcode,
            payload: Payload::Integer(value),
        }
    }

    pub fn text(opcode: char, info: impl Into<String>) -> Self {
        Self {
            opcode,
            payload: Payload::Text(info.into()),
        }
    }

    pub fn query(opcode: char) -> Self {
        Self {
            opcode,
            payload: Payload::Absent,
        }
    }

    /// Wire form: `/<OP><int>\r\n`, `/<OP>:<text>\r\n` or `/<OP>?\r\n`.
    pub fn encode(&self) -> String {
        let op = self.opcode.to_ascii_uppercase();
        match &self.payload {
            Payload::Integer(v) => format!("/{op}{v}\r\n"),
            Payload::Text(s) => format!("/{op}:{s}\r\n"),
            Payload::Absent => format!("/{op}?\r\n"),
        }
    }
}

/// One decoded device response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub opcode: char,
    pub payload: Payload,
    pub is_query: bool,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.opcode == ERROR_OPCODE
    }
}

/// Decode one response line. Lines missing the `/` prefix or carrying a
/// non-decimal numeric body violate the wire format and are rejected;
/// device-reported errors (`/E0`, `/E1`) decode fine and are classified
/// by the dispatcher.
pub fn decode_response(line: &str) -> Result<Response, ProtoError> {
    let Some(body) = line.strip_prefix('/') else {
        return Err(ProtoError::MalformedResponse(line.to_string()));
    };
    let body = body.trim_end_matches(['\r', '\n']);

    let mut chars = body.chars();
    let opcode = chars
        .next()
        .ok_or_else(|| ProtoError::MalformedResponse(line.to_string()))?;
    let rest = chars.as_str();

    // A bare opcode is a query acknowledgment, same as `/<OP>?`.
    if rest.is_empty() || rest == "?" {
        return Ok(Response {
            opcode,
            payload: Payload::Absent,
            is_query: true,
        });
    }

    if let Some(info) = rest.strip_prefix(':') {
        return Ok(Response {
            opcode,
            payload: Payload::Text(info.to_string()),
            is_query: false,
        });
    }

    let value: i64 = rest
        .parse()
        .map_err(|_| ProtoError::MalformedResponse(line.to_string()))?;
    Ok(Response {
        opcode,
        payload: Payload::Integer(value),
        is_query: false,
    })
}
