use crate::domain::context::EnvSnapshot;
use std::collections::BTreeMap;
use std::io::Read;

/// Snapshots the process environment, merging in `.env` from the working
/// directory (or a parent) when one exists.
pub fn load_environment() -> EnvSnapshot {
    let process_vars = std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)));

    match dotenvy::dotenv_iter() {
        Ok(dotenv) => merge_environment(process_vars, Some(dotenv)),
        Err(err) => {
            if !err.not_found() {
                tracing::warn!("ignoring .env file: {err}");
            }
            merge_environment(process_vars, None::<dotenvy::Iter<std::fs::File>>)
        }
    }
}

/// Builds the snapshot from process variables plus `.env` entries.
///
/// Variables already set in the process win over `.env`, the same
/// precedence `dotenvy::dotenv()` applies. Parsing stops at the first
/// malformed `.env` line.
pub fn merge_environment<P, R>(process_vars: P, dotenv: Option<dotenvy::Iter<R>>) -> EnvSnapshot
where
    P: IntoIterator<Item = (String, String)>,
    R: Read,
{
    let mut vars: BTreeMap<String, String> = process_vars.into_iter().collect();

    for entry in dotenv.into_iter().flatten() {
        match entry {
            Ok((name, value)) => {
                vars.entry(name).or_insert(value);
            }
            Err(err) => {
                tracing::warn!("stopped reading .env: {err}");
                break;
            }
        }
    }

    tracing::debug!("environment snapshot holds {} variables", vars.len());
    EnvSnapshot::from_vars(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process() -> Vec<(String, String)> {
        vec![("TOKEN".to_string(), "from-process".to_string())]
    }

    #[test]
    fn dotenv_fills_in_missing_variables() {
        let dotenv = dotenvy::from_read_iter("QUEUE=urgent\nTOKEN=from-file\n".as_bytes());
        let env = merge_environment(process(), Some(dotenv));

        assert_eq!(
            env.as_value(),
            &json!({"QUEUE": "urgent", "TOKEN": "from-process"})
        );
    }

    #[test]
    fn without_dotenv_only_process_vars_are_seen() {
        let env = merge_environment(process(), None::<dotenvy::Iter<&[u8]>>);
        assert_eq!(env.as_value(), &json!({"TOKEN": "from-process"}));
    }

    #[test]
    fn malformed_dotenv_keeps_what_was_read() {
        let dotenv = dotenvy::from_read_iter("A=1\nthis is not valid\nB=2\n".as_bytes());
        let env = merge_environment(Vec::new(), Some(dotenv));

        assert_eq!(env.as_value(), &json!({"A": "1"}));
    }
}
