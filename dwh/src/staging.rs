use crate::pipeline::TableCount;
use crate::schema::tables::{STAGING_EVENTS, STAGING_SONGS};
use crate::warehouse::Warehouse;
use common::config::{IamRoleConfig, S3Config};
use common::{Error, Result, Stage};
use tracing::{debug, info};

/// One bulk ingestion of newline-delimited JSON objects into a staging table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDirective {
    pub table: &'static str,
    pub source: String,
    pub credentials: Option<String>,
    pub region: String,
}

impl CopyDirective {
    pub fn new(
        table: &'static str,
        source: &str,
        credentials: Option<&str>,
        region: &str,
    ) -> Self {
        Self {
            table,
            source: unquote(source).to_string(),
            credentials: credentials.map(|arn| unquote(arn).to_string()),
            region: unquote(region).to_string(),
        }
    }

    /// Renders the Redshift `COPY` statement.
    pub fn to_sql(&self) -> Result<String> {
        let role = self.credentials.as_deref().ok_or_else(|| {
            Error::Ingestion(format!("{}: no IAM role configured for COPY", self.table))
        })?;

        Ok(format!(
            "COPY {} FROM {} CREDENTIALS {} FORMAT AS JSON 'auto ignorecase' REGION {}",
            self.table,
            quote_literal(&self.source),
            quote_literal(&format!("aws_iam_role={}", role)),
            quote_literal(&self.region),
        ))
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// Legacy config files carry the quotes of the SQL literal in the value.
fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Populates the two staging tables from object storage.
pub struct BulkLoader {
    events: CopyDirective,
    songs: CopyDirective,
}

impl BulkLoader {
    pub fn new(s3: &S3Config, iam_role: Option<&IamRoleConfig>) -> Self {
        let arn = iam_role.map(|role| role.arn.as_str());
        Self {
            events: CopyDirective::new(STAGING_EVENTS, &s3.log_data, arn, &s3.region),
            songs: CopyDirective::new(STAGING_SONGS, &s3.song_data, arn, &s3.region),
        }
    }

    pub fn directives(&self) -> [&CopyDirective; 2] {
        [&self.events, &self.songs]
    }

    pub async fn load_staging(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<TableCount>> {
        let mut counts = Vec::with_capacity(2);

        for directive in self.directives() {
            info!(
                table = directive.table,
                source = %directive.source,
                engine = warehouse.engine(),
                "Copying staging data"
            );
            let rows = warehouse
                .copy_into(directive)
                .await
                .map_err(|e| e.in_stage(Stage::Ingestion, directive.table))?;
            debug!(table = directive.table, rows, "Staging copy complete");

            counts.push(TableCount {
                table: directive.table,
                rows,
            });
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaManager;
    use crate::test_utils::{event, play_event, song, staged_warehouse, write_objects};
    use crate::warehouse::{LocalWarehouse, Value};

    fn s3_config(log_data: &str, song_data: &str) -> S3Config {
        S3Config {
            log_data: log_data.to_string(),
            song_data: song_data.to_string(),
            region: "us-west-2".to_string(),
        }
    }

    #[test]
    fn test_copy_sql_shape() {
        let directive = CopyDirective::new(
            STAGING_EVENTS,
            "'s3://udacity-dend/log_data'",
            Some("arn:aws:iam::123456789012:role/dwhRole"),
            "us-west-2",
        );

        assert_eq!(
            directive.to_sql().unwrap(),
            "COPY staging_events FROM 's3://udacity-dend/log_data' \
             CREDENTIALS 'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole' \
             FORMAT AS JSON 'auto ignorecase' REGION 'us-west-2'"
        );
    }

    #[test]
    fn test_copy_sql_escapes_quotes() {
        let directive =
            CopyDirective::new(STAGING_SONGS, "s3://bucket/o'brien", Some("arn"), "eu-west-1");
        let sql = directive.to_sql().unwrap();
        assert!(sql.contains("FROM 's3://bucket/o''brien'"));
        assert!(sql.ends_with("REGION 'eu-west-1'"));
    }

    #[test]
    fn test_copy_without_credentials_fails() {
        let directive =
            CopyDirective::new(STAGING_SONGS, "s3://bucket/song_data", None, "us-west-2");
        assert!(matches!(directive.to_sql(), Err(Error::Ingestion(_))));
    }

    #[test]
    fn test_directives_follow_config() {
        let loader = BulkLoader::new(
            &s3_config("s3://bucket/log_data", "s3://bucket/song_data"),
            Some(&IamRoleConfig {
                arn: "arn".to_string(),
            }),
        );
        let [events, songs] = loader.directives();
        assert_eq!(events.table, STAGING_EVENTS);
        assert_eq!(events.source, "s3://bucket/log_data");
        assert_eq!(songs.table, STAGING_SONGS);
        assert_eq!(songs.credentials.as_deref(), Some("arn"));
    }

    #[tokio::test]
    async fn test_load_staging_reads_every_object() {
        let events = vec![
            play_event("10", "Sylvie", "free", 1541106106796, "Song A", "Artist A", 200.0),
            event("10", "Sylvie", "free", 1541106106797, "Home"),
        ];
        let songs = vec![
            song("SOAAA", "Song A", "ARAAA", "Artist A", 200.0, 2001),
            song("SOBBB", "Song B", "ARBBB", "Artist B", 180.4, 1999),
        ];

        let (_dir, mut warehouse) = staged_warehouse(&events, &songs).await;

        let rows = warehouse
            .query("select count(*) from staging_events")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::BigInt(2)]]);

        let rows = warehouse
            .query("select userid, sessionid from staging_events where page = 'Home'")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(10), Value::BigInt(38)]]);

        let rows = warehouse
            .query("select song_id, year from staging_songs order by song_id")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::from("SOAAA"), Value::Int(2001)],
                vec![Value::from("SOBBB"), Value::Int(1999)],
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_required_field_fails_whole_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad_song = song("SOCCC", "Song C", "ARCCC", "Artist C", 100.0, 2010);
        bad_song.as_object_mut().unwrap().remove("title");
        let events = [play_event("1", "A", "free", 1541106106796, "Song C", "Artist C", 100.0)];
        let songs = [
            song("SODDD", "Song D", "ARDDD", "Artist D", 10.0, 2000),
            bad_song,
        ];
        let log_path = write_objects(dir.path(), "log_data", &events);
        let song_path = write_objects(dir.path(), "song_data", &songs);

        let mut warehouse = LocalWarehouse::default();
        SchemaManager::new().reset(&mut warehouse).await.unwrap();

        let loader = BulkLoader::new(&s3_config(&log_path, &song_path), None);
        let err = loader.load_staging(&mut warehouse).await.unwrap_err();

        match err {
            Error::Ingestion(message) => {
                assert!(message.starts_with("staging_songs:"), "{}", message);
                assert!(message.contains("title"), "{}", message);
            }
            other => panic!("Expected ingestion error, got {:?}", other),
        }

        let rows = warehouse
            .query("select count(*) from staging_songs")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::BigInt(0)]]);
    }

    #[tokio::test]
    async fn test_empty_source_is_an_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("nothing_here");
        std::fs::create_dir_all(&empty).unwrap();
        let empty = empty.to_string_lossy().into_owned();

        let mut warehouse = LocalWarehouse::default();
        SchemaManager::new().reset(&mut warehouse).await.unwrap();

        let loader = BulkLoader::new(&s3_config(&empty, &empty), None);
        let err = loader.load_staging(&mut warehouse).await.unwrap_err();
        assert!(matches!(err, Error::Ingestion(_)), "{:?}", err);
    }
}
