use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{ListResult, Publication, Resource};
use crate::prepare::PrepareOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub folder_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub deleted: bool,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_resource(resource: &Resource) -> io::Result<()> {
        Self::print_json(resource)
    }

    pub fn print_publication(publication: &Publication) -> io::Result<()> {
        Self::print_json(publication)
    }

    pub fn print_prepare(outcome: &PrepareOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    pub fn print_delete(result: &DeleteResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
