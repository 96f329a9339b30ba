//! JSON scenario vector loader shared by engine tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ScenarioVector {
    pub description: String,
    pub groups: Vec<GroupData>,
    pub programs: Vec<ProgramData>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expect: Vec<ExpectChain>,
    #[serde(default)]
    pub traffic: Vec<TrafficCase>,
}

#[derive(Debug, Deserialize)]
pub struct GroupData {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Returns `returns`, or `then` when the first byte equals `if_first_byte`.
#[derive(Debug, Deserialize)]
pub struct ProgramData {
    pub id: u32,
    pub returns: i32,
    #[serde(default)]
    pub if_first_byte: Option<u8>,
    #[serde(default)]
    pub then: i32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Attach {
        group: String,
        hook: String,
        program: u32,
        #[serde(default)]
        flags: Vec<String>,
        #[serde(default)]
        default_class: u32,
        #[serde(default)]
        expect_error: Option<ExpectError>,
    },
    Detach {
        group: String,
        hook: String,
        #[serde(default)]
        program: Option<u32>,
        #[serde(default)]
        expect_error: Option<ExpectError>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpectChain {
    pub group: String,
    pub hook: String,
    pub programs: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TrafficCase {
    pub group: String,
    pub hook: String,
    pub family: String,
    pub frame: FrameData,
    pub verdict: String,
    #[serde(default)]
    pub class: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub encoding: String,
    pub data: String,
}

impl FrameData {
    pub fn decode(&self) -> Vec<u8> {
        match self.encoding.as_str() {
            "hex" => hex::decode(&self.data).expect("invalid hex in test vector"),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}
