//! URL intent inspection.

use serde::Serialize;
use storesight_dashboard::{PageIntent, parse_intents};
use url::Url;

use super::{CliError, print_json};

#[derive(Serialize)]
struct ParsedUrl {
    intents: Vec<&'static str>,
    url: String,
}

/// Print the intents `url` carries and the URL without them.
pub fn parse(url: &str) -> Result<(), CliError> {
    let url = Url::parse(url)?;
    let (intents, cleaned) = parse_intents(&url);

    print_json(&ParsedUrl {
        intents: intents.iter().map(PageIntent::param).collect(),
        url: cleaned.into(),
    })
}
