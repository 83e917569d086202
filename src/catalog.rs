//! Endpoint catalog: where each object kind lives, how it pages, and how its records look.
//!
//! Identifier conventions differ between endpoint families, so every kind names its own
//! [`IdRule`] instead of relying on a shared heuristic.

// self
use crate::{
	_prelude::*,
	client::{ContentKind, EntitlementGate},
	error::ConfigError,
	paginate::{ItemsShape, PageFamily},
	record::{ExtraField, IdRule},
};

/// Gate for the ABAC-protected dynamic group endpoints.
pub const ABAC_GATE: EntitlementGate = EntitlementGate {
	endpoint: "dynamic_groups",
	entitlement: "ABAC",
	remediation: "Ask your IBM Security Verify administrator to grant the API client ABAC \
	              entitlements for dynamic groups.",
};

/// Object kinds the extractor can snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
	/// Application list.
	Applications,
	/// SAML federations, one detail document each.
	Federations,
	/// Attribute definitions.
	Attributes,
	/// SCIM groups.
	Groups,
	/// MFA authenticators, one detail document each.
	MfaAuthenticators,
	/// API clients.
	ApiClients,
	/// Identity sources.
	IdentitySources,
	/// Attribute functions.
	AttributeFunctions,
	/// ABAC dynamic groups.
	DynamicGroups,
	/// SCIM service provider capabilities.
	ScimCapabilities,
	/// Per-application detail with entitlements and SSO configuration.
	ApplicationDetails,
	/// Per-dynamic-group detail.
	DynamicGroupDetails,
}
impl ObjectKind {
	/// Every kind in run order: list jobs first, then jobs that read their snapshots.
	pub const ALL: [Self; 12] = [
		Self::Applications,
		Self::Federations,
		Self::Attributes,
		Self::Groups,
		Self::MfaAuthenticators,
		Self::ApiClients,
		Self::IdentitySources,
		Self::AttributeFunctions,
		Self::DynamicGroups,
		Self::ScimCapabilities,
		Self::ApplicationDetails,
		Self::DynamicGroupDetails,
	];

	/// Catalog entry for this kind.
	pub const fn spec(self) -> &'static KindSpec {
		match self {
			Self::Applications => &APPLICATIONS,
			Self::Federations => &FEDERATIONS,
			Self::Attributes => &ATTRIBUTES,
			Self::Groups => &GROUPS,
			Self::MfaAuthenticators => &MFA_AUTHENTICATORS,
			Self::ApiClients => &API_CLIENTS,
			Self::IdentitySources => &IDENTITY_SOURCES,
			Self::AttributeFunctions => &ATTRIBUTE_FUNCTIONS,
			Self::DynamicGroups => &DYNAMIC_GROUPS,
			Self::ScimCapabilities => &SCIM_CAPABILITIES,
			Self::ApplicationDetails => &APPLICATION_DETAILS,
			Self::DynamicGroupDetails => &DYNAMIC_GROUP_DETAILS,
		}
	}

	/// Stable snake_case name used on the command line and in logs.
	pub const fn as_str(self) -> &'static str {
		self.spec().name
	}

	/// Returns `true` for jobs that read a parent snapshot.
	pub const fn is_detail(self) -> bool {
		matches!(self.spec().job, Job::Detail { .. })
	}
}
impl Display for ObjectKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ObjectKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().to_ascii_lowercase().replace('-', "_");

		Self::ALL.into_iter().find(|kind| kind.as_str() == wanted).ok_or_else(|| {
			ConfigError::UnknownKind {
				name: s.to_owned(),
				known: Self::ALL.map(Self::as_str).join(", "),
			}
		})
	}
}

/// Static description of one object kind.
#[derive(Clone, Debug)]
pub struct KindSpec {
	/// Kind name.
	pub name: &'static str,
	/// Collection path below the tenant URL.
	pub path: &'static str,
	/// Snapshot file name inside the environment directory.
	pub output_file: &'static str,
	/// Identifier field written on every record.
	pub id_field: &'static str,
	/// Identifier extraction rule for list items.
	pub id_rule: IdRule,
	/// Extra record fields, read from list items or, for detail jobs, from parent records.
	pub extras: &'static [ExtraField],
	/// Accept header for every request of this kind.
	pub content: ContentKind,
	/// Entitlement classification for 401/403 answers.
	pub gate: Option<EntitlementGate>,
	/// Traversal performed by the job.
	pub job: Job,
}

/// Traversal performed by one job.
#[derive(Clone, Copy, Debug)]
pub enum Job {
	/// Paginated collection.
	List {
		/// Page family.
		family: PageFamily,
		/// Item envelope.
		shape: ItemsShape,
		/// Optional per-item detail replacement.
		enrichment: Enrichment,
	},
	/// One detail request per identifier of a parent snapshot.
	Detail {
		/// Kind whose snapshot supplies the identifiers.
		parent: ObjectKind,
		/// Detail request shape.
		detail: DetailShape,
	},
	/// One request returning a single document.
	Single,
}

/// Per-item detail replacement applied to list jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enrichment {
	/// Keep list items as returned.
	None,
	/// Replace each item with its detail document; drop items whose detail fails.
	DetailOrSkip,
	/// Replace each item with its detail document; keep the list item when the detail fails.
	DetailOrBasic,
}

/// How a detail job fetches one identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailShape {
	/// `{path}/{id}`.
	Path,
	/// `{path}/{id}` plus its `/entitlements` and `/sso` sub-resources.
	Application,
}

const APPLICATIONS: KindSpec = KindSpec {
	name: "applications",
	path: "/v1.0/applications",
	output_file: "applications.jsonl",
	id_field: "application_id",
	id_rule: IdRule::SelfHref,
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::OffsetLimit,
		shape: ItemsShape::keys(&["_embedded.applications", "applications"]),
		enrichment: Enrichment::None,
	},
};
const FEDERATIONS: KindSpec = KindSpec {
	name: "federations",
	path: "/v1.0/saml/federations",
	output_file: "federations.jsonl",
	id_field: "federation_id",
	id_rule: IdRule::Keys(&["id"]),
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::OffsetLimit,
		shape: ItemsShape::keys(&["federations"]).or_bare(),
		enrichment: Enrichment::DetailOrSkip,
	},
};
const ATTRIBUTES: KindSpec = KindSpec {
	name: "attributes",
	path: "/v1.0/attributes",
	output_file: "attributes.jsonl",
	id_field: "attribute_id",
	id_rule: IdRule::Keys(&["id", "name"]),
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::OffsetLimit,
		shape: ItemsShape::keys(&["attributes", "schemas"]),
		enrichment: Enrichment::None,
	},
};
const GROUPS: KindSpec = KindSpec {
	name: "groups",
	path: "/v2.0/Groups",
	output_file: "groups.jsonl",
	id_field: "group_id",
	id_rule: IdRule::Keys(&["id", "groupId"]),
	extras: &[],
	content: ContentKind::Scim,
	gate: None,
	job: Job::List {
		family: PageFamily::Scim,
		shape: ItemsShape::keys(&["groups", "Groups", "Resources"]).or_bare(),
		enrichment: Enrichment::None,
	},
};
const MFA_AUTHENTICATORS: KindSpec = KindSpec {
	name: "mfa_authenticators",
	path: "/v1.0/authenticators",
	output_file: "mfa_authenticators.jsonl",
	id_field: "method_id",
	id_rule: IdRule::Keys(&["id"]),
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::OffsetLimit,
		shape: ItemsShape::keys(&["authenticators", "methods", "authnMethods"]).or_bare(),
		enrichment: Enrichment::DetailOrBasic,
	},
};
const API_CLIENTS: KindSpec = KindSpec {
	name: "api_clients",
	path: "/v1.0/apiclients",
	output_file: "api_clients.jsonl",
	id_field: "client_id",
	id_rule: IdRule::Keys(&["id"]),
	extras: &[ExtraField { name: "client_name", keys: &["clientName"] }],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::PageNumber { default_limit: 200 },
		shape: ItemsShape::keys(&["apiClients"]),
		enrichment: Enrichment::None,
	},
};
const IDENTITY_SOURCES: KindSpec = KindSpec {
	name: "identity_sources",
	path: "/v1.0/identitysources",
	output_file: "identity_sources.jsonl",
	id_field: "source_id",
	id_rule: IdRule::Keys(&["id"]),
	extras: &[ExtraField { name: "instance_name", keys: &["instanceName"] }],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::PageNumber { default_limit: 100 },
		shape: ItemsShape::keys(&["identitySources"]),
		enrichment: Enrichment::None,
	},
};
const ATTRIBUTE_FUNCTIONS: KindSpec = KindSpec {
	name: "attribute_functions",
	path: "/v1.0/attributefunctions",
	output_file: "attribute_functions.jsonl",
	id_field: "function_id",
	id_rule: IdRule::Keys(&["id", "functionId"]),
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::List {
		family: PageFamily::SingleShot,
		shape: ItemsShape::keys(&["attributeFunctions", "functions"]).or_bare(),
		enrichment: Enrichment::None,
	},
};
const DYNAMIC_GROUPS: KindSpec = KindSpec {
	name: "dynamic_groups",
	path: "/v1.0/dynamicgroups",
	output_file: "dynamic_groups.jsonl",
	id_field: "group_id",
	id_rule: IdRule::Keys(&["id", "groupId"]),
	extras: &[ExtraField { name: "group_name", keys: &["name", "displayName"] }],
	content: ContentKind::Json,
	gate: Some(ABAC_GATE),
	job: Job::List {
		family: PageFamily::OffsetLimit,
		shape: ItemsShape::keys(&["dynamicGroups", "groups"]).or_bare(),
		enrichment: Enrichment::None,
	},
};
const SCIM_CAPABILITIES: KindSpec = KindSpec {
	name: "scim_capabilities",
	path: "/v2.0/SCIM/capabilities",
	output_file: "scim_capabilities.jsonl",
	id_field: "endpoint",
	id_rule: IdRule::Keys(&[]),
	extras: &[],
	content: ContentKind::Scim,
	gate: None,
	job: Job::Single,
};
const APPLICATION_DETAILS: KindSpec = KindSpec {
	name: "application_details",
	path: "/v1.0/applications",
	output_file: "application_details.jsonl",
	id_field: "application_id",
	id_rule: IdRule::Keys(&["application_id"]),
	extras: &[],
	content: ContentKind::Json,
	gate: None,
	job: Job::Detail { parent: ObjectKind::Applications, detail: DetailShape::Application },
};
const DYNAMIC_GROUP_DETAILS: KindSpec = KindSpec {
	name: "dynamic_group_details",
	path: "/v1.0/dynamicgroups",
	output_file: "dynamic_groups_detail.jsonl",
	id_field: "group_id",
	id_rule: IdRule::Keys(&["group_id"]),
	extras: &[ExtraField { name: "group_name", keys: &["group_name"] }],
	content: ContentKind::Json,
	gate: Some(ABAC_GATE),
	job: Job::Detail { parent: ObjectKind::DynamicGroups, detail: DetailShape::Path },
};
