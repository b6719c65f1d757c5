use crate::config::RosterConfig;
use crate::display;
use crate::error::Result;
use crate::github::{MemberDirectory, MemberSummary, UserProfile};
use crate::output::RecordWriter;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::Write;
use std::pin::pin;

/// Walks every page of `config.org`'s member list and writes one record per member.
///
/// Records go out in upstream order and are flushed one at a time. The first
/// failed request ends the run; whatever was already written stays written.
/// Returns the number of records emitted.
pub async fn export<D, W>(
    directory: &D,
    config: &RosterConfig,
    out: &mut RecordWriter<W>,
) -> Result<usize>
where
    D: MemberDirectory,
    W: Write,
{
    let result = stream_pages(directory, config, out).await;
    let flushed = out.flush();
    let written = result?;
    flushed?;
    Ok(written)
}

async fn stream_pages<D, W>(
    directory: &D,
    config: &RosterConfig,
    out: &mut RecordWriter<W>,
) -> Result<usize>
where
    D: MemberDirectory,
    W: Write,
{
    out.write_header()?;

    let mut written = 0;
    let mut page = 1;
    loop {
        let listing = directory.list_members(&config.org, page).await?;
        display::debug(
            config.verbose,
            &format!(
                "page {page}: {} member(s) of {}",
                listing.members.len(),
                config.org
            ),
        );

        let mut profiles = pin!(stream::iter(listing.members)
            .map(|member| resolve(directory, config.fetch_full_user, member))
            .buffered(config.jobs.max(1)));

        while let Some(profile) = profiles.try_next().await? {
            out.write(&profile)?;
            written += 1;
        }

        if listing.next_page == 0 {
            break;
        }
        page = listing.next_page;
    }

    display::debug(
        config.verbose,
        &format!("{written} member(s) exported from {}", config.org),
    );
    Ok(written)
}

async fn resolve<D: MemberDirectory>(
    directory: &D,
    fetch_full_user: bool,
    member: MemberSummary,
) -> Result<UserProfile> {
    let profile = if fetch_full_user {
        directory.get_user(&member.login).await?
    } else {
        member.into()
    };
    Ok(profile.without_nulls())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RosterError;
    use crate::github::MemberPage;
    use crate::output::OutputFormat;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List(u32),
        User(String),
    }

    /// In-memory directory keyed by page number, recording every call.
    #[derive(Default)]
    struct FakeDirectory {
        pages: HashMap<u32, MemberPage>,
        names: HashMap<String, String>,
        fail_page: Option<u32>,
        fail_user: Option<String>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeDirectory {
        fn with_pages(pages: Vec<(u32, Vec<&str>, u32)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(number, logins, next_page)| {
                    let members = logins
                        .iter()
                        .map(|login| MemberSummary {
                            login: login.to_string(),
                            fields: Default::default(),
                        })
                        .collect();
                    (
                        number,
                        MemberPage {
                            members,
                            next_page,
                        },
                    )
                })
                .collect();
            Self {
                pages,
                ..Default::default()
            }
        }

        fn named(mut self, login: &str, name: &str) -> Self {
            self.names.insert(login.to_string(), name.to_string());
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn user_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::User(_)))
                .count()
        }
    }

    impl MemberDirectory for FakeDirectory {
        async fn list_members(&self, _org: &str, page: u32) -> Result<MemberPage> {
            self.calls.lock().unwrap().push(Call::List(page));
            if self.fail_page == Some(page) {
                return Err(RosterError::GitHub(format!("page {page} unavailable")));
            }
            Ok(self.pages.get(&page).cloned().unwrap_or_default())
        }

        async fn get_user(&self, login: &str) -> Result<UserProfile> {
            self.calls.lock().unwrap().push(Call::User(login.to_string()));
            if self.fail_user.as_deref() == Some(login) {
                return Err(RosterError::GitHub(format!("user {login} unavailable")));
            }
            Ok(UserProfile {
                login: login.to_string(),
                name: self.names.get(login).cloned(),
                fields: Default::default(),
            })
        }
    }

    fn config(format: OutputFormat, fetch_full_user: bool) -> RosterConfig {
        RosterConfig {
            org: "acme".to_string(),
            token: "ghp_test".to_string(),
            format,
            fetch_full_user,
            jobs: 1,
            per_page: 100,
            api_url: None,
            verbose: false,
        }
    }

    async fn run(directory: &FakeDirectory, config: &RosterConfig) -> (Result<usize>, String) {
        let mut out = RecordWriter::new(Vec::new(), config.format, config.fetch_full_user);
        let result = export(directory, config, &mut out).await;
        (result, String::from_utf8(out.into_inner()).unwrap())
    }

    fn acme() -> FakeDirectory {
        FakeDirectory::with_pages(vec![(1, vec!["alice", "bob"], 0)])
            .named("alice", "Alice A")
            .named("bob", "")
    }

    #[tokio::test]
    async fn logins_only_csv() {
        let directory = acme();
        let (result, out) = run(&directory, &config(OutputFormat::Csv, false)).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(out, "login\nalice\nbob\n");
        assert_eq!(directory.user_calls(), 0);
    }

    #[tokio::test]
    async fn full_user_csv() {
        let directory = acme();
        let (result, out) = run(&directory, &config(OutputFormat::Csv, true)).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(out, "login,name\nalice,Alice A\nbob,\n");
        assert_eq!(
            directory.calls(),
            vec![
                Call::List(1),
                Call::User("alice".to_string()),
                Call::User("bob".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn json_has_no_header() {
        let directory = acme();
        let (result, out) = run(&directory, &config(OutputFormat::Json, true)).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(
            out,
            "{\"login\":\"alice\",\"name\":\"Alice A\"}\n{\"login\":\"bob\",\"name\":\"\"}\n"
        );
    }

    #[tokio::test]
    async fn follows_next_page_numbers_in_order() {
        let directory = FakeDirectory::with_pages(vec![
            (1, vec!["a", "b"], 2),
            (2, vec!["c"], 5),
            (5, vec!["d", "e"], 0),
        ]);
        let (result, out) = run(&directory, &config(OutputFormat::Csv, false)).await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(out, "login\na\nb\nc\nd\ne\n");
        assert_eq!(
            directory.calls(),
            vec![Call::List(1), Call::List(2), Call::List(5)]
        );
    }

    #[tokio::test]
    async fn empty_org_writes_only_header() {
        let directory = FakeDirectory::with_pages(vec![(1, vec![], 0)]);
        let (result, out) = run(&directory, &config(OutputFormat::Csv, true)).await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(out, "login,name\n");
    }

    #[tokio::test]
    async fn listing_error_stops_pagination() {
        let mut directory = FakeDirectory::with_pages(vec![
            (1, vec!["a"], 2),
            (2, vec!["b"], 3),
            (3, vec!["c"], 0),
        ]);
        directory.fail_page = Some(2);
        let (result, out) = run(&directory, &config(OutputFormat::Csv, false)).await;

        assert!(matches!(result, Err(RosterError::GitHub(_))));
        assert_eq!(out, "login\na\n");
        assert_eq!(directory.calls(), vec![Call::List(1), Call::List(2)]);
    }

    #[tokio::test]
    async fn lookup_error_stops_everything() {
        let mut directory =
            FakeDirectory::with_pages(vec![(1, vec!["a", "b", "c"], 2), (2, vec!["d"], 0)]);
        directory.fail_user = Some("b".to_string());
        let (result, out) = run(&directory, &config(OutputFormat::Csv, true)).await;

        assert!(matches!(result, Err(RosterError::GitHub(_))));
        assert_eq!(out, "login,name\na,\n");
        assert_eq!(
            directory.calls(),
            vec![
                Call::List(1),
                Call::User("a".to_string()),
                Call::User("b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_lookups_keep_member_order() {
        let logins = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
        let directory = FakeDirectory::with_pages(vec![
            (1, logins[..4].to_vec(), 2),
            (2, logins[4..].to_vec(), 0),
        ]);
        let mut config = config(OutputFormat::Csv, true);
        config.jobs = 3;
        let (result, out) = run(&directory, &config).await;

        assert_eq!(result.unwrap(), logins.len());
        let rows: Vec<&str> = out.lines().skip(1).collect();
        let expected: Vec<String> = logins.iter().map(|l| format!("{l},")).collect();
        assert_eq!(rows, expected);
        assert_eq!(directory.user_calls(), logins.len());
    }

    /// Stdout after the reader went away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn closed_stdout_is_broken_pipe_for_csv() {
        let directory = acme();
        let config = config(OutputFormat::Csv, false);
        let mut out = RecordWriter::new(ClosedPipe, config.format, false);

        let err = export(&directory, &config, &mut out).await.unwrap_err();
        assert!(err.is_broken_pipe());
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn closed_stdout_is_broken_pipe_for_json() {
        let directory = acme();
        let config = config(OutputFormat::Json, false);
        let mut out = RecordWriter::new(ClosedPipe, config.format, false);

        let err = export(&directory, &config, &mut out).await.unwrap_err();
        assert!(err.is_broken_pipe());
        assert_eq!(directory.calls(), vec![Call::List(1)]);
    }

    #[tokio::test]
    async fn api_error_survives_a_failed_flush() {
        let mut directory = acme();
        directory.fail_page = Some(1);
        let config = config(OutputFormat::Json, false);
        let mut out = RecordWriter::new(ClosedPipe, config.format, false);

        let err = export(&directory, &config, &mut out).await.unwrap_err();
        assert!(matches!(err, RosterError::GitHub(_)));
        assert!(!err.is_broken_pipe());
    }

    #[tokio::test]
    async fn null_fields_are_dropped() {
        let mut directory = FakeDirectory::with_pages(vec![(1, vec!["alice"], 0)]);
        let member = &mut directory.pages.get_mut(&1).unwrap().members[0];
        member.fields.insert("id".to_string(), serde_json::json!(7));
        member.fields.insert("company".to_string(), serde_json::Value::Null);

        let (result, out) = run(&directory, &config(OutputFormat::Json, false)).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(out, "{\"login\":\"alice\",\"id\":7}\n");
    }
}
