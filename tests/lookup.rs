//! Directory lookups against SQLite tables standing in for the views.
//!
//! Run: `cargo test --test lookup`

mod common;

use common::seeded;
use dbi::lookup::{Identity, LookupClient, LookupConfig, LookupError, TagMapping};
use pretty_assertions::assert_eq;

const PEOPLE: &str = "CREATE TABLE pr_fis_vw (
    pr_identity_utln TEXT, pr_identity_prid TEXT, fis_proprietary_id TEXT,
    pr_identity_email TEXT, pr_identity_firstname TEXT, pr_identity_middlename TEXT,
    pr_identity_lastname TEXT, user_primary_affiliation TEXT, user_primary_title TEXT,
    user_primary_division TEXT, user_primary_dept_prog TEXT, user_primary_campus TEXT,
    user_profile_link TEXT, user_pr_status TEXT)";

const COURSES: &str = "CREATE TABLE course_catalog_vw (
    subject_cat_nbr TEXT, title TEXT, course_school TEXT, course_dept_prog TEXT,
    campus_ld TEXT, campus_std TEXT, course_title TEXT)";

const TAGS: &str = "CREATE TABLE rt_tag_mappings (snow_tag TEXT, jira_tag TEXT)";

async fn client() -> LookupClient {
    let db = seeded(&[
        PEOPLE,
        COURSES,
        TAGS,
        "INSERT INTO pr_fis_vw VALUES ('jdoe01', '100', 'F-1', 'Jane.Doe@tufts.edu', 'Jane',
            NULL, 'Doe', 'Faculty', 'Professor', 'Arts and Sciences', 'Computer Science',
            'Medford', 'https://directory/jdoe01', 'A')",
        "INSERT INTO pr_fis_vw (pr_identity_utln, pr_identity_email, user_pr_status)
            VALUES ('twin01', 'twin@tufts.edu', 'A'), ('twin01', 'twin2@tufts.edu', 'I'),
                   ('nomail', NULL, 'I')",
        "INSERT INTO course_catalog_vw VALUES ('COMP 11', 'Intro to CS', 'AS', 'Computer Science',
            'Medford/Somerville', 'MED', 'Introduction to Computer Science')",
        "INSERT INTO rt_tag_mappings VALUES ('hpc-cluster', 'HPC'), ('canvas', NULL),
            ('dup', 'A'), ('dup', 'B')",
    ])
    .await
    .unwrap();
    LookupClient::new(db)
}

#[tokio::test]
async fn test_get_email() {
    let client = client().await;
    assert_eq!(client.get_email("jdoe01").await.unwrap(), "Jane.Doe@tufts.edu");

    let err = client.get_email("nomail").await.unwrap_err();
    assert_eq!(err.code(), 404);
    assert!(matches!(
        client.get_email("ghost").await,
        Err(LookupError::NoMatchFound(_))
    ));
}

#[tokio::test]
async fn test_utln_and_email_lookup() {
    let client = client().await;

    let twins = client.utln_lookup("twin01").await.unwrap();
    assert_eq!(twins.len(), 2);

    let jane = client.email_lookup("JANE.DOE@Tufts.edu").await.unwrap();
    assert_eq!(
        jane,
        vec![Identity {
            utln: "jdoe01".into(),
            email: Some("Jane.Doe@tufts.edu".into()),
        }]
    );

    let err = client.email_lookup("not an email").await.unwrap_err();
    assert_eq!(err.code(), 400);
}

#[tokio::test]
async fn test_person_profile() {
    let client = client().await;

    let jane = client.person_profile("jdoe01").await.unwrap().unwrap();
    assert_eq!(jane.pr_id.as_deref(), Some("100"));
    assert_eq!(jane.middle_name, None);
    assert_eq!(jane.dept_prog.as_deref(), Some("Computer Science"));
    assert!(jane.is_active);

    assert_eq!(client.person_profile("ghost").await.unwrap(), None);
    assert!(matches!(
        client.person_profile("twin01").await,
        Err(LookupError::TooManyMatches(_))
    ));
}

#[tokio::test]
async fn test_course_lookup() {
    let client = client().await;

    for input in ["COMP 11", "comp_11", "  Comp   11  lecture"] {
        let courses = client.course_lookup(input).await.unwrap();
        assert_eq!(courses.len(), 1, "{}", input);
        assert_eq!(courses[0].catalog_no, "COMP 11");
        assert_eq!(courses[0].campus.as_deref(), Some("MED"));
    }

    assert!(client.course_lookup("COMP 99").await.unwrap().is_empty());
    assert!(matches!(
        client.course_lookup("COMP11").await,
        Err(LookupError::InvalidCourseCatalogNumber(_))
    ));
}

#[tokio::test]
async fn test_tag_mappings() {
    let client = client().await;

    assert_eq!(client.tag_mappings().await.unwrap().len(), 4);
    assert_eq!(
        client.tag_from_techconnect("hpc-cluster").await.unwrap(),
        Some(TagMapping {
            snow_tag: "hpc-cluster".into(),
            jira_tag: Some("HPC".into()),
        })
    );
    assert_eq!(
        client.jira_tag_from_mapping("hpc-cluster").await.unwrap().as_deref(),
        Some("HPC")
    );
    assert_eq!(client.jira_tag_from_mapping("canvas").await.unwrap(), None);
    assert_eq!(client.tag_from_techconnect("unknown").await.unwrap(), None);
    assert!(matches!(
        client.tag_from_techconnect("dup").await,
        Err(LookupError::TooManyMatches(_))
    ));
}

#[tokio::test]
async fn test_missing_view_is_database_error() {
    let db = seeded(&[]).await.unwrap();
    let client = LookupClient::with_config(
        db,
        LookupConfig {
            people_view: "no_such_view".into(),
            ..LookupConfig::default()
        },
    );

    let err = client.utln_lookup("jdoe01").await.unwrap_err();
    assert!(matches!(err, LookupError::Database(_)));
    assert_eq!(err.code(), 500);
}
