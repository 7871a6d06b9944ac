//! CLI input: reads JSON array or JSON Lines and turns items into operations.

use crate::cli::parse::Commands;
use crate::error::ApiError;
use crate::operation::OperationKind;
use crate::record::{EntityReference, IntersectLink, Record};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use uuid::Uuid;

/// Open input items from a file, or stdin when the path is absent or "-".
pub fn open_inputs(path: Option<&Path>) -> Result<InputReader<Box<dyn BufRead>>, ApiError> {
    let source: Box<dyn BufRead> = match path {
        Some(path) if path != Path::new("-") => Box::new(BufReader::new(File::open(path)?)),
        _ => Box::new(std::io::stdin().lock()),
    };
    Ok(InputReader::new(source))
}

/// Input items in arrival order. JSON Lines are yielded as each line is
/// read; a document starting with `[` is read whole as a JSON array.
///
/// A malformed line yields `ApiError::InvalidInput` naming the line and
/// reading continues with the next one.
pub struct InputReader<R> {
    source: R,
    line: usize,
    started: bool,
    buffered: Option<std::vec::IntoIter<Value>>,
}

impl<R: BufRead> InputReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            line: 0,
            started: false,
            buffered: None,
        }
    }

    fn read_array(&mut self, first_line: String) -> Result<(), ApiError> {
        let mut text = first_line;
        self.source.read_to_string(&mut text)?;
        let items = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            Ok(_) => return Err(ApiError::InvalidInput("expected a JSON array".to_string())),
            Err(e) => return Err(ApiError::InvalidInput(format!("input array: {}", e))),
        };
        self.buffered = Some(items.into_iter());
        Ok(())
    }
}

impl<R: BufRead> Iterator for InputReader<R> {
    type Item = Result<Value, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(items) = self.buffered.as_mut() {
            return items.next().map(Ok);
        }
        loop {
            let mut line = String::new();
            match self.source.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !self.started {
                self.started = true;
                if trimmed.starts_with('[') {
                    if let Err(e) = self.read_array(line) {
                        self.buffered = Some(Vec::new().into_iter());
                        return Some(Err(e));
                    }
                    return self.next();
                }
            }
            return Some(serde_json::from_str(trimmed).map_err(|e| {
                ApiError::InvalidInput(format!("line {}: {}", self.line, e))
            }));
        }
    }
}

#[derive(Deserialize)]
struct DeleteItem {
    table: String,
    id: Uuid,
    #[serde(default)]
    entity1: Option<EntityReference>,
    #[serde(default)]
    entity2: Option<EntityReference>,
}

/// How input items of one command become operations.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationTemplate {
    Create,
    Update,
    Upsert,
    Delete {
        if_exists: bool,
        relationship: Option<String>,
    },
    Invoke {
        request_name: String,
    },
}

impl OperationTemplate {
    pub fn from_command(command: &Commands) -> Option<Self> {
        match command {
            Commands::Create { .. } => Some(Self::Create),
            Commands::Update { .. } => Some(Self::Update),
            Commands::Upsert { .. } => Some(Self::Upsert),
            Commands::Delete {
                if_exists,
                relationship,
                ..
            } => Some(Self::Delete {
                if_exists: *if_exists,
                relationship: relationship.clone(),
            }),
            Commands::Invoke { request_name, .. } => Some(Self::Invoke {
                request_name: request_name.clone(),
            }),
            Commands::Config => None,
        }
    }

    /// Build and validate the operation for one input item.
    pub fn build(&self, item: &Value) -> Result<OperationKind, ApiError> {
        let kind = match self {
            Self::Create => OperationKind::Create {
                record: Record::deserialize(item)?,
            },
            Self::Update => OperationKind::Update {
                record: Record::deserialize(item)?,
            },
            Self::Upsert => OperationKind::Upsert {
                record: Record::deserialize(item)?,
            },
            Self::Delete {
                if_exists,
                relationship,
            } => {
                let parsed = DeleteItem::deserialize(item)?;
                let intersect = match relationship {
                    Some(relationship) => match (parsed.entity1, parsed.entity2) {
                        (Some(entity1), Some(entity2)) => Some(IntersectLink {
                            relationship: relationship.clone(),
                            entity1,
                            entity2,
                        }),
                        _ => {
                            return Err(ApiError::InvalidInput(format!(
                                "{}:{} needs entity1 and entity2 to disassociate",
                                parsed.table, parsed.id
                            )))
                        }
                    },
                    None => None,
                };
                OperationKind::Delete {
                    target: EntityReference::new(parsed.table, parsed.id),
                    if_exists: *if_exists,
                    intersect,
                }
            }
            Self::Invoke { request_name } => OperationKind::Invoke {
                request_name: request_name.clone(),
                parameters: match item {
                    Value::Object(map) => map.clone(),
                    Value::Null => Default::default(),
                    _ => {
                        return Err(ApiError::InvalidInput(
                            "invoke input must be a parameter object".to_string(),
                        ))
                    }
                },
            },
        };
        kind.validate()?;
        Ok(kind)
    }
}
