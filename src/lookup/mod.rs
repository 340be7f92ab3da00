//! Directory lookups against the people, course and tag views.
//!
//! ```rust,ignore
//! let client = LookupClient::new(db);
//! let email = client.get_email("jdoe01").await?;
//! let courses = client.course_lookup("COMP_11").await?;
//! ```

mod errors;
mod normalize;

pub use errors::{LookupError, LookupResult};
pub use normalize::{normalize_course_cat_no, normalize_email_address};

use crate::frame::Frame;
use crate::interface::Database;
use crate::value::Value;

use serde::{Deserialize, Serialize};

/// Names of the views the client reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub people_view: String,
    pub course_view: String,
    pub tag_table: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            people_view: "pr_fis_vw".to_string(),
            course_view: "course_catalog_vw".to_string(),
            tag_table: "rt_tag_mappings".to_string(),
        }
    }
}

/// A login name and its directory email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub utln: String,
    pub email: Option<String>,
}

/// One person in the directory.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Person {
    pub utln: String,
    pub pr_id: Option<String>,
    pub fis_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_affiliation: Option<String>,
    pub primary_title: Option<String>,
    pub division: Option<String>,
    pub dept_prog: Option<String>,
    pub campus: Option<String>,
    pub profile_link: Option<String>,
    pub is_active: bool,
}

/// One course catalog entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Course {
    pub catalog_no: String,
    pub title: Option<String>,
    pub school: Option<String>,
    pub dept_prog: Option<String>,
    pub campus_long: Option<String>,
    pub campus: Option<String>,
    pub title_display: Option<String>,
}

/// A TechConnect (ServiceNow) tag and the Jira tag it maps to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagMapping {
    pub snow_tag: String,
    pub jira_tag: Option<String>,
}

// (view column, output name)
const PERSON_FIELDS: &[(&str, &str)] = &[
    ("pr_identity_utln", "utln"),
    ("pr_identity_prid", "pr_id"),
    ("fis_proprietary_id", "fis_id"),
    ("pr_identity_email", "email"),
    ("pr_identity_firstname", "first_name"),
    ("pr_identity_middlename", "middle_name"),
    ("pr_identity_lastname", "last_name"),
    ("user_primary_affiliation", "primary_affiliation"),
    ("user_primary_title", "primary_title"),
    ("user_primary_division", "division"),
    ("user_primary_dept_prog", "dept_prog"),
    ("user_primary_campus", "campus"),
    ("user_profile_link", "profile_link"),
    ("user_pr_status", "is_active"),
];

const COURSE_FIELDS: &[(&str, &str)] = &[
    ("subject_cat_nbr", "catalog_no"),
    ("title", "title"),
    ("course_school", "school"),
    ("course_dept_prog", "dept_prog"),
    ("campus_ld", "campus_long"),
    ("campus_std", "campus"),
    ("course_title", "title_display"),
];

fn text(frame: &Frame, row: usize, column: &str) -> Option<String> {
    frame
        .get(row, column)
        .filter(|v| !v.is_null())
        .map(Value::to_string)
}

/// Looks people, courses and tags up through a [`Database`].
#[derive(Clone)]
pub struct LookupClient {
    db: Database,
    config: LookupConfig,
}

impl LookupClient {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, LookupConfig::default())
    }

    pub fn with_config(db: Database, config: LookupConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn select(&self, view: &str, fields: &[(&str, &str)], filter: &str) -> String {
        let dialect = self.db.dialect();
        let cols: Vec<String> = fields
            .iter()
            .map(|(src, tgt)| {
                format!(
                    "{} AS {}",
                    dialect.quote_identifier(src),
                    dialect.quote_identifier(tgt)
                )
            })
            .collect();
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            cols.join(", "),
            dialect.quote_path(view),
            filter,
            dialect.placeholder(1)
        )
    }

    async fn identities(&self, filter: &str, key: &str) -> LookupResult<Vec<Identity>> {
        let sql = self.select(
            &self.config.people_view,
            &[("pr_identity_utln", "utln"), ("pr_identity_email", "email")],
            filter,
        );
        let frame = self.db.read_sql(&sql, &[Value::from(key)]).await?;
        Ok((0..frame.len())
            .map(|i| Identity {
                utln: text(&frame, i, "utln").unwrap_or_default(),
                email: text(&frame, i, "email"),
            })
            .collect())
    }

    /// Directory email of `utln`.
    pub async fn get_email(&self, utln: &str) -> LookupResult<String> {
        self.utln_lookup(utln)
            .await?
            .into_iter()
            .find_map(|id| id.email)
            .ok_or_else(|| LookupError::NoMatchFound(format!("no email for '{}'", utln)))
    }

    pub async fn utln_lookup(&self, utln: &str) -> LookupResult<Vec<Identity>> {
        let filter = self.db.dialect().quote_identifier("pr_identity_utln");
        self.identities(&filter, utln).await
    }

    /// Identities with this email, compared after normalization.
    pub async fn email_lookup(&self, email: &str) -> LookupResult<Vec<Identity>> {
        let email = normalize_email_address(email)?;
        let filter = format!(
            "LOWER({})",
            self.db.dialect().quote_identifier("pr_identity_email")
        );
        self.identities(&filter, &email).await
    }

    /// Full directory profile of `utln`, if there is one.
    pub async fn person_profile(&self, utln: &str) -> LookupResult<Option<Person>> {
        let filter = self.db.dialect().quote_identifier("pr_identity_utln");
        let sql = self.select(&self.config.people_view, PERSON_FIELDS, &filter);
        let frame = self.db.read_sql(&sql, &[Value::from(utln)]).await?;
        if frame.is_empty() {
            return Ok(None);
        }
        if frame.len() > 1 {
            return Err(LookupError::TooManyMatches(format!(
                "{} directory entries for '{}'",
                frame.len(),
                utln
            )));
        }
        Ok(Some(Person {
            utln: text(&frame, 0, "utln").unwrap_or_default(),
            pr_id: text(&frame, 0, "pr_id"),
            fis_id: text(&frame, 0, "fis_id"),
            email: text(&frame, 0, "email"),
            first_name: text(&frame, 0, "first_name"),
            middle_name: text(&frame, 0, "middle_name"),
            last_name: text(&frame, 0, "last_name"),
            primary_affiliation: text(&frame, 0, "primary_affiliation"),
            primary_title: text(&frame, 0, "primary_title"),
            division: text(&frame, 0, "division"),
            dept_prog: text(&frame, 0, "dept_prog"),
            campus: text(&frame, 0, "campus"),
            profile_link: text(&frame, 0, "profile_link"),
            is_active: frame
                .get(0, "is_active")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }))
    }

    /// Catalog entries for a course number such as `COMP 11` or `comp_11`.
    pub async fn course_lookup(&self, catalog_no: &str) -> LookupResult<Vec<Course>> {
        let catalog_no = normalize_course_cat_no(catalog_no)?;
        let filter = format!(
            "LOWER({})",
            self.db.dialect().quote_identifier("subject_cat_nbr")
        );
        let sql = self.select(&self.config.course_view, COURSE_FIELDS, &filter);
        let frame = self.db.read_sql(&sql, &[Value::from(catalog_no)]).await?;
        Ok((0..frame.len())
            .map(|i| Course {
                catalog_no: text(&frame, i, "catalog_no").unwrap_or_default(),
                title: text(&frame, i, "title"),
                school: text(&frame, i, "school"),
                dept_prog: text(&frame, i, "dept_prog"),
                campus_long: text(&frame, i, "campus_long"),
                campus: text(&frame, i, "campus"),
                title_display: text(&frame, i, "title_display"),
            })
            .collect())
    }

    pub async fn tag_mappings(&self) -> LookupResult<Vec<TagMapping>> {
        let frame = self
            .db
            .read_frame(&self.config.tag_table, Some(&["snow_tag", "jira_tag"][..]))
            .await?;
        Ok((0..frame.len())
            .filter_map(|i| {
                Some(TagMapping {
                    snow_tag: text(&frame, i, "snow_tag")?,
                    jira_tag: text(&frame, i, "jira_tag"),
                })
            })
            .collect())
    }

    /// The mapping for a TechConnect tag: `None` if unmapped, an error if
    /// the tag is mapped more than once.
    pub async fn tag_from_techconnect(&self, tag: &str) -> LookupResult<Option<TagMapping>> {
        let mut matches: Vec<TagMapping> = self
            .tag_mappings()
            .await?
            .into_iter()
            .filter(|m| m.snow_tag == tag)
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(LookupError::TooManyMatches(format!(
                "{} mappings for tag '{}'",
                n, tag
            ))),
        }
    }

    /// The Jira tag a TechConnect tag maps to.
    pub async fn jira_tag_from_mapping(&self, tag: &str) -> LookupResult<Option<String>> {
        Ok(self
            .tag_from_techconnect(tag)
            .await?
            .and_then(|m| m.jira_tag))
    }
}
