//! Built-in capabilities for Deliberate.
//!
//! Capabilities give the control loop a way to gather information: look
//! up companies and contacts, search the web, read the prospect profile,
//! and save notes into working memory.
//!
//! The lookup data is a small fixed table so runs are deterministic and
//! need no network access.

pub mod company_search;
pub mod contact_lookup;
pub mod read_profile;
pub mod save_note;
pub mod web_search;

use deliberate_core::tool::CapabilityRegistry;

pub use read_profile::ProfileContext;

/// Create a registry with the general-purpose capabilities:
/// `search_companies`, `get_contact`, `web_search` and `save_note`.
pub fn default_registry() -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with(Box::new(company_search::CompanySearchCapability))
        .with(Box::new(contact_lookup::ContactLookupCapability))
        .with(Box::new(web_search::WebSearchCapability))
        .with(Box::new(save_note::SaveNoteCapability))
}

/// The default registry plus `read_profile` bound to this run's profile.
pub fn prospect_registry(profile: ProfileContext) -> CapabilityRegistry {
    default_registry().with(Box::new(read_profile::ReadProfileCapability::new(profile)))
}
