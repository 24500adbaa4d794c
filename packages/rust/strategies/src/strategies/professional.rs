//! Professional-network strategy (LinkedIn).

use profilecrawl_shared::{Link, Subject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::schema::OutputSchema;

const SCHEMA_VERSION: u32 = 1;

/// Reads a LinkedIn profile: positions, education, certifications and recent activity.
pub struct ProfessionalNetworkStrategy {
    schema: OutputSchema,
}

impl ProfessionalNetworkStrategy {
    pub fn new() -> Self {
        Self {
            schema: OutputSchema::of::<LinkedinResult>("linkedin", SCHEMA_VERSION),
        }
    }
}

impl Default for ProfessionalNetworkStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for ProfessionalNetworkStrategy {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn task_description(&self, subject: &Subject, link: &Link) -> String {
        let name = &subject.name;
        let url = &link.url;
        format!(
            "Get all information about {name} from their LinkedIn profile. Start from URL {url}.\n\n\
             Extract their profession, experiences, education, certifications, etc. Check out \
             the most recent 10 updates, including posts, reposts, etc.\n\
             - if you see a post by {name}, copy it.\n\
             - if you see a repost, only make a summary.\n\n\
             Be thorough, truthful and factual."
        )
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec!["*.linkedin.com".to_string()])
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkedinPersonalInfo {
    pub name: String,
    pub job_title: String,
    pub linkedin_url: String,
    pub current_work_position: String,
    pub sector: String,
    pub user_bio: String,
    pub location: String,
    pub email: String,
    pub phone_number: String,
    pub website: String,
    pub others: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkedinExperience {
    pub job_title: String,
    pub company: String,
    pub employment_type: String,
    pub duration_or_dates: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkedinEducation {
    pub education_title: String,
    pub university_or_school_name: String,
    pub course_name: String,
    pub duration_or_dates: String,
    pub activities_and_associations: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkedinCertification {
    pub name: String,
    pub emitting_organization: String,
    pub course_name: String,
    pub date_concession: String,
    pub url: String,
    pub description: String,
}

/// Record extracted from a LinkedIn profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LinkedinResult {
    pub personal_info: LinkedinPersonalInfo,
    pub experience: Vec<LinkedinExperience>,
    pub education: Vec<LinkedinEducation>,
    pub certifications: Vec<LinkedinCertification>,
    pub skills: Vec<String>,
    pub posts: Vec<String>,
    pub reposts: Vec<String>,
    pub interests: String,
    pub profile_summary: String,
}
