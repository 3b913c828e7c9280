use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use super::*;
use crate::candidate::CandidateSpec;
use crate::error::BoxError;
use crate::instance::Instance;

const SPIED: [&str; 4] = [
	"app.adapters.cache:redis",
	"app.adapters:root",
	"app.adapters_evil:run",
	"internal.debug:shell",
];

struct Spy {
	calls: Arc<AtomicUsize>,
	guard: FactoryGuard,
}

fn spy_guard(allow: &[&str]) -> Spy {
	let calls = Arc::new(AtomicUsize::new(0));
	let mut builder = FactoryCatalog::builder();
	for reference in SPIED {
		let calls = Arc::clone(&calls);
		builder
			.insert(reference, move |_candidate: Arc<Candidate>| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Ok::<_, BoxError>(Instance::new(())) }
			})
			.unwrap();
	}
	Spy {
		calls,
		guard: FactoryGuard::new(AllowList::new(allow).unwrap(), builder.build()),
	}
}

fn label(err: &SecurityError) -> &'static str {
	match err {
		SecurityError::Malformed { .. } => "malformed",
		SecurityError::PrivateSymbol { .. } => "private",
		SecurityError::NotAllowed { .. } => "not-allowed",
		SecurityError::UnknownFactory { .. } => "unknown",
	}
}

#[rstest]
#[case::parent_traversal("../other_module:evil", "malformed")]
#[case::slash_path("app/adapters/cache:redis", "malformed")]
#[case::backslash_path("app\\adapters:root", "malformed")]
#[case::percent_encoded_dot("app.adapters%2Ecache:redis", "malformed")]
#[case::percent_encoded_colon("app.adapters.cache%3Aredis", "malformed")]
#[case::double_dot("app..adapters:root", "malformed")]
#[case::leading_dot(".app.adapters:root", "malformed")]
#[case::trailing_dot("app.adapters.:root", "malformed")]
#[case::attribute_chain("app.adapters.cache:redis.__class__", "malformed")]
#[case::two_colons("app.adapters.cache:redis:evil", "malformed")]
#[case::colon_in_module("app:adapters:root", "malformed")]
#[case::no_colon("app.adapters.cache", "malformed")]
#[case::empty_symbol("app.adapters.cache:", "malformed")]
#[case::empty_module(":redis", "malformed")]
#[case::empty("", "malformed")]
#[case::whitespace("app.adapters.cache:redis ", "malformed")]
#[case::nul_byte("app.adapters.cache:red\0is", "malformed")]
#[case::homoglyph("app.adapters.c\u{0430}che:redis", "malformed")]
#[case::leading_digit("1app.adapters:root", "malformed")]
#[case::dunder_symbol("app.adapters.cache:__init__", "private")]
#[case::private_symbol("app.adapters.cache:_redis", "private")]
#[case::private_module("app.adapters._internal:make", "private")]
#[case::prefix_confusion("app.adapters_evil:run", "not-allowed")]
#[case::sibling_package("app.adapter:root", "not-allowed")]
#[case::catalogued_but_unlisted("internal.debug:shell", "not-allowed")]
#[case::parent_of_prefix("app:root", "not-allowed")]
#[case::allowed_but_unknown("app.adapters.cache:missing", "unknown")]
fn untrusted_references_are_rejected_without_invocation(#[case] reference: &str, #[case] expected: &str) {
	let spy = spy_guard(&["app.adapters"]);
	for source in [CandidateSource::RemoteManifest, CandidateSource::Plugin] {
		let err = match spy.guard.resolve_factory(reference, source) {
			Ok(_) => panic!("{reference:?} must be rejected for {source}"),
			Err(err) => err,
		};
		assert_eq!(label(&err), expected, "{reference:?}: {err}");
		assert_eq!(err.reference(), reference);
	}
	assert_eq!(spy.calls.load(Ordering::SeqCst), 0, "rejected factories must never run");
}

#[test]
fn overlong_reference_is_rejected() {
	let spy = spy_guard(&["app.adapters"]);
	let reference = format!("app.adapters.{}:redis", "a".repeat(MAX_REFERENCE_LEN));
	let err = spy.guard.resolve_factory(&reference, CandidateSource::Plugin).err().unwrap();
	assert_eq!(label(&err), "malformed");
}

#[rstest]
#[case("app.adapters.cache:redis")]
#[case("app.adapters:root")]
fn allowed_references_resolve(#[case] reference: &str) {
	let spy = spy_guard(&["app.adapters"]);
	assert!(spy.guard.resolve_factory(reference, CandidateSource::RemoteManifest).is_ok());
	assert_eq!(spy.calls.load(Ordering::SeqCst), 0, "resolving must not invoke the factory");
}

#[tokio::test]
async fn resolved_factory_is_the_catalogued_one() {
	let spy = spy_guard(&["app.adapters"]);
	let candidate = CandidateSpec::new("adapter", "cache", "redis")
		.factory("app.adapters.cache:redis")
		.source(CandidateSource::Plugin)
		.into_candidate(1);
	let factory = spy.guard.resolve_candidate(&candidate).unwrap();
	factory.create(Arc::new(candidate)).await.unwrap();
	assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn trusted_sources_skip_the_allow_list_but_not_the_grammar() {
	let spy = spy_guard(&[]);
	for source in [CandidateSource::LocalPackage, CandidateSource::ExplicitOverride] {
		assert!(spy.guard.resolve_factory("internal.debug:shell", source).is_ok());
		let err = spy.guard.resolve_factory("internal.debug:_shell", source).err().unwrap();
		assert_eq!(label(&err), "private");
		let err = spy.guard.resolve_factory("internal.nothing:here", source).err().unwrap();
		assert_eq!(label(&err), "unknown");
	}
}

#[test]
fn empty_allow_list_denies_every_untrusted_reference() {
	let spy = spy_guard(&[]);
	for reference in SPIED {
		let err = spy.guard.resolve_factory(reference, CandidateSource::Plugin).err().unwrap();
		assert_eq!(label(&err), "not-allowed");
	}
	assert!(AllowList::deny_all().is_empty());
}

#[test]
fn exact_allow_entries_admit_only_that_reference() {
	let spy = spy_guard(&["app.adapters.cache:redis"]);
	assert!(spy.guard.resolve_factory("app.adapters.cache:redis", CandidateSource::Plugin).is_ok());
	let err = spy.guard.resolve_factory("app.adapters:root", CandidateSource::Plugin).err().unwrap();
	assert_eq!(label(&err), "not-allowed");
}

#[rstest]
#[case("app..adapters")]
#[case("app/adapters")]
#[case("app._private")]
#[case("app.adapters:")]
#[case("")]
#[case("app.adapters:__call__")]
fn malformed_allow_entries_are_refused(#[case] entry: &str) {
	assert!(AllowList::new([entry]).is_err(), "{entry:?} must not be accepted as an allow entry");
}

#[test]
fn catalog_rejects_unreachable_keys() {
	let mut builder = FactoryCatalog::builder();
	let factory = |_candidate: Arc<Candidate>| async { Ok::<_, BoxError>(Instance::new(())) };
	assert!(builder.insert("../evil:x", factory).is_err());
	assert!(builder.insert("app._hidden:x", factory).is_err());
	builder.insert("app.ok:x", factory).unwrap();
	let catalog = builder.build();
	assert_eq!(catalog.references(), ["app.ok:x"]);
	assert!(catalog.contains("app.ok:x"));
}

#[test]
fn module_within_respects_segment_boundaries() {
	let r = FactoryRef::parse("app.adapters.cache:redis").unwrap();
	assert!(r.module_within("app"));
	assert!(r.module_within("app.adapters"));
	assert!(r.module_within("app.adapters.cache"));
	assert!(!r.module_within("app.adapt"));
	assert!(!r.module_within("app.adapters.cache.redis"));
	assert_eq!(r.module(), "app.adapters.cache");
	assert_eq!(r.symbol(), "redis");
}
