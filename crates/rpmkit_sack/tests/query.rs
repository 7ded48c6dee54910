use assert_matches::assert_matches;
use rpmkit_sack::{
    DepKind, DepPatterns, ExcludeFlags, Filter, LoadRepoFlags, Query, QueryError, RepoMetadata,
    ReldepList, ResolveSpecSettings, Sack,
};
use rpmkit_types::QueryCmp;

fn repo_path(name: &str) -> String {
    format!(
        "{}/../../test-data/repos/{name}.json",
        env!("CARGO_MANIFEST_DIR")
    )
}

/// Loads the `system` fixture as the installed repository and the others as available ones.
fn sack(repos: &[&str]) -> Sack {
    let mut sack = Sack::new();
    for &name in repos {
        if name == "system" {
            let metadata = RepoMetadata::from_path(repo_path(name)).unwrap();
            sack.load_system_repo(metadata).unwrap();
        } else {
            sack.load_repo_file(repo_path(name), LoadRepoFlags::ALL)
                .unwrap();
        }
    }
    sack
}

fn nevras(query: &mut Query) -> Vec<String> {
    query
        .run()
        .unwrap()
        .iter()
        .map(|p| p.nevra().unwrap())
        .collect()
}

fn filtered(sack: &Sack, filters: impl IntoIterator<Item = Filter>) -> Vec<String> {
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    for filter in filters {
        query.filter(filter).unwrap();
    }
    nevras(&mut query)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_reldep_glob_dwm() {
    let sack = sack(&["dwm"]);
    let mut list = ReldepList::new(&sack.pool_ref());
    assert!(list.add_reldep_with_glob("dwm*").unwrap());
    assert_eq!(list.len(), 9);

    let mut versioned = ReldepList::new(&sack.pool_ref());
    assert!(versioned.add_reldep_with_glob("dwm-debug* >= 6.0").unwrap());
    assert_eq!(
        versioned.to_strings().unwrap(),
        [
            "dwm-debuginfo >= 6.0",
            "dwm-debuginfo(x86-64) >= 6.0",
            "dwm-debugsource >= 6.0",
            "dwm-debugsource(x86-64) >= 6.0"
        ]
    );
}

#[test]
fn test_query_conjunction() {
    let sack = sack(&["dwm"]);
    let name = || Filter::Name(QueryCmp::Eq, strings(&["dwm", "st"]));
    let arch = || Filter::Arch(QueryCmp::Eq, strings(&["x86_64"]));

    let expected = [
        "dwm-6.0-1.x86_64",
        "dwm-6.1-1.x86_64",
        "st-0.8.1-2.x86_64",
    ];
    assert_eq!(filtered(&sack, [name(), arch()]), expected);
    assert_eq!(filtered(&sack, [arch(), name()]), expected);
}

#[test]
fn test_run_is_idempotent() {
    let sack = sack(&["dwm"]);
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    query.filter_name(QueryCmp::Glob, &["dwm*"]).unwrap();
    let first = nevras(&mut query);
    let second = nevras(&mut query);
    assert_eq!(first.len(), 5);
    assert_eq!(first, second);

    // A clone of an applied query is applied too
    let mut clone = query.clone();
    assert_matches!(
        clone.filter_arch(QueryCmp::Eq, &["i686"]),
        Err(QueryError::QueryAlreadyApplied)
    );
}

#[test]
fn test_latest() {
    let sack = sack(&["dwm"]);
    // Both architectures of dwm-6.1-1 are kept
    insta::assert_snapshot!(filtered(&sack, [Filter::Latest(true)]).join("\n"), @r"
    dwm-6.1-1.x86_64
    dwm-6.1-1.i686
    dwm-debuginfo-6.1-1.x86_64
    dwm-debugsource-6.1-1.x86_64
    st-0.8.1-2.x86_64
    ");
    assert_eq!(
        filtered(
            &sack,
            [
                Filter::Arch(QueryCmp::Eq, strings(&["x86_64"])),
                Filter::LatestPerArch(false)
            ]
        ),
        ["dwm-6.0-1.x86_64"]
    );
}

#[test]
fn test_installed_and_available() {
    let sack = sack(&["system", "fedora", "updates"]);

    insta::assert_snapshot!(filtered(&sack, [Filter::Upgrades(true)]).join("\n"), @r"
    glibc-2.28-26.fc29.x86_64
    glibc-common-2.28-26.fc29.x86_64
    ");
    assert_eq!(
        filtered(&sack, [Filter::Downgrades(true)]),
        ["bash-4.4.12-7.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::Upgradable(true)]),
        ["glibc-2.28-9.fc29.x86_64", "glibc-common-2.28-9.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::Downgradable(true)]),
        ["bash-4.4.23-1.fc29.x86_64"]
    );
    insta::assert_snapshot!(filtered(&sack, [Filter::Extras(true)]).join("\n"), @r"
    kernel-4.18.16-300.fc29.x86_64
    kernel-4.19.2-300.fc29.x86_64
    dnf-4.0.9-1.fc29.noarch
    local-tool-1.0-1.x86_64
    ");
    assert_eq!(filtered(&sack, [Filter::Installed(true)]).len(), 7);
    assert_eq!(filtered(&sack, [Filter::Available(true)]).len(), 7);
    assert_eq!(filtered(&sack, [Filter::Installed(false)]).len(), 7);
    assert_eq!(
        filtered(
            &sack,
            [
                Filter::Name(QueryCmp::Eq, strings(&["glibc"])),
                Filter::Latest(true)
            ]
        ),
        ["glibc-2.28-26.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::RepoName(QueryCmp::Eq, strings(&["updates"]))]).len(),
        3
    );
    assert!(filtered(&sack, [Filter::Empty(true)]).is_empty());
}

#[test]
fn test_duplicated() {
    let sack = sack(&["system", "fedora"]);
    assert_eq!(
        filtered(&sack, [Filter::Duplicated(true)]),
        ["kernel-4.18.16-300.fc29.x86_64", "kernel-4.19.2-300.fc29.x86_64"]
    );
    sack.set_installonly(["kernel"]);
    assert!(filtered(&sack, [Filter::Duplicated(true)]).is_empty());
}

#[test]
fn test_nevra() {
    let sack = sack(&["system", "fedora", "updates"]);
    let nevra = |cmp, pattern: &str| Filter::Nevra(cmp, strings(&[pattern]));

    assert_eq!(
        filtered(&sack, [nevra(QueryCmp::Gt, "glibc-2.28-9.fc29.x86_64")]),
        ["glibc-2.28-26.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [nevra(QueryCmp::Eq, "glibc-0:2.28-9.fc29.x86_64")]),
        ["glibc-2.28-9.fc29.x86_64", "glibc-2.28-9.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [nevra(QueryCmp::Glob, "glibc-2.28-*")]).len(),
        3
    );
    assert_eq!(
        filtered(&sack, [nevra(QueryCmp::Eq, "bash-0:4.4.12-7.fc29.x86_64")]),
        ["bash-4.4.12-7.fc29.x86_64"]
    );
    assert_eq!(
        filtered(
            &sack,
            [Filter::NevraStrict(
                QueryCmp::Lte,
                strings(&["glibc-0:2.28-9.fc29.x86_64"])
            )]
        )
        .len(),
        2
    );

    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    assert_matches!(
        query.filter(Filter::NevraStrict(
            QueryCmp::Eq,
            strings(&["glibc-2.28-9.fc29.x86_64"])
        )),
        Err(QueryError::BadQuery(_))
    );
    assert_matches!(
        query.filter(Filter::NevraStrict(QueryCmp::Glob, strings(&["glibc*"]))),
        Err(QueryError::NotSupportedCmpType { .. })
    );
}

#[test]
fn test_versions() {
    let sack = sack(&["fedora", "updates"]);
    assert_eq!(
        filtered(
            &sack,
            [
                Filter::Name(QueryCmp::Eq, strings(&["bash"])),
                Filter::Evr(QueryCmp::Lt, strings(&["4.4.20-1"]))
            ]
        ),
        ["bash-4.4.12-7.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::Release(QueryCmp::Glob, strings(&["26.*"]))]).len(),
        2
    );
    assert_eq!(
        filtered(
            &sack,
            [
                Filter::Name(QueryCmp::Eq, strings(&["glibc"])),
                Filter::Version(QueryCmp::Eq, strings(&["2.28"]))
            ]
        )
        .len(),
        2
    );
    assert_eq!(
        filtered(&sack, [Filter::Recent(1_535_000_000)]),
        ["glibc-2.28-26.fc29.x86_64", "glibc-common-2.28-26.fc29.x86_64"]
    );
}

#[test]
fn test_epoch() {
    let sack = sack(&["advisories"]);
    assert_eq!(
        filtered(&sack, [Filter::Epoch(QueryCmp::Gt, vec![0])]),
        ["pkg-libs-1:1.3-4.x86_64", "unresolvable-1:2-3.noarch"]
    );
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    assert_matches!(
        query.filter(Filter::Epoch(QueryCmp::Glob, vec![0])),
        Err(QueryError::NotSupportedCmpType { .. })
    );
}

#[test]
fn test_strings() {
    let sack = sack(&["fedora"]);
    assert_eq!(
        filtered(&sack, [Filter::Summary(QueryCmp::IContains, strings(&["gnu"]))]),
        ["glibc-2.28-9.fc29.x86_64", "bash-4.4.23-1.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::Name(QueryCmp::StartsWith, strings(&["glibc"]))]).len(),
        2
    );
    assert_eq!(
        filtered(&sack, [Filter::Name(QueryCmp::Regex, strings(&["^(wget|bash)$"]))]),
        ["wget-1.19.5-5.fc29.x86_64", "bash-4.4.23-1.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::Name(QueryCmp::NotIGlob, strings(&["GLIBC*"]))]),
        ["wget-1.19.5-5.fc29.x86_64", "bash-4.4.23-1.fc29.x86_64"]
    );
    assert_eq!(
        filtered(
            &sack,
            [Filter::Sourcerpm(QueryCmp::Eq, strings(&["wget-1.19.5-5.fc29.src.rpm"]))]
        ),
        ["wget-1.19.5-5.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [Filter::File(QueryCmp::Glob, strings(&["/usr/bin/*"]))]).len(),
        3
    );
    assert_matches!(
        sack.query(ExcludeFlags::APPLY_EXCLUDES)
            .filter(Filter::Name(QueryCmp::Regex, strings(&["("]))),
        Err(QueryError::InvalidPattern(_))
    );
}

#[test]
fn test_dependencies() {
    let sack = sack(&["system", "fedora", "updates"]);
    let provides = |cmp, pattern: &str| {
        Filter::Dependency(
            DepKind::Provides,
            cmp,
            DepPatterns::Strings(strings(&[pattern])),
        )
    };

    assert_eq!(
        filtered(&sack, [provides(QueryCmp::Eq, "libc.so.6()(64bit)")]).len(),
        3
    );
    assert_eq!(
        filtered(&sack, [provides(QueryCmp::Eq, "glibc >= 2.28")]).len(),
        3
    );
    assert_eq!(
        filtered(&sack, [provides(QueryCmp::Eq, "glibc > 2.28-9.fc29")]),
        ["glibc-2.28-26.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [provides(QueryCmp::Eq, "/usr/bin/wget")]),
        ["wget-1.19.5-5.fc29.x86_64"]
    );
    assert_eq!(
        filtered(&sack, [provides(QueryCmp::Eq, "/bin/sh")]).len(),
        3
    );
    assert_eq!(
        filtered(
            &sack,
            [Filter::Dependency(
                DepKind::Requires,
                QueryCmp::Glob,
                DepPatterns::Strings(strings(&["glibc*"]))
            )]
        ),
        [
            "glibc-2.28-9.fc29.x86_64",
            "wget-1.19.5-5.fc29.x86_64",
            "glibc-2.28-9.fc29.x86_64",
            "glibc-2.28-26.fc29.x86_64"
        ]
    );

    let mut reldeps = ReldepList::new(&sack.pool_ref());
    reldeps.add_reldep("/bin/sh").unwrap();
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    query
        .filter_reldeps(DepKind::Requires, QueryCmp::Eq, &reldeps)
        .unwrap();
    assert_eq!(nevras(&mut query), ["dnf-4.0.9-1.fc29.noarch"]);

    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    assert_matches!(
        query.filter_reldeps(DepKind::Requires, QueryCmp::Glob, &reldeps),
        Err(QueryError::NotSupportedCmpType { .. })
    );
    assert_matches!(
        query.filter_provides(QueryCmp::Contains, &["glibc"]),
        Err(QueryError::NotSupportedCmpType { .. })
    );
    assert_matches!(
        query.filter_provides(QueryCmp::Eq, &["glibc >="]),
        Err(QueryError::Reldep(_))
    );

    let other = Sack::new();
    assert_matches!(
        query.filter_reldeps(
            DepKind::Requires,
            QueryCmp::Eq,
            &ReldepList::new(&other.pool_ref())
        ),
        Err(QueryError::IncompatiblePool)
    );
}

#[test]
fn test_pkg_filter() {
    let sack = sack(&["fedora"]);
    let mut bash = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    bash.filter_name(QueryCmp::Eq, &["bash"]).unwrap();
    let bash = bash.package_set().unwrap();

    assert_eq!(
        filtered(&sack, [Filter::Pkg(QueryCmp::Eq, bash.clone())]),
        ["bash-4.4.23-1.fc29.x86_64"]
    );
    assert_eq!(filtered(&sack, [Filter::Pkg(QueryCmp::Neq, bash)]).len(), 3);
}

#[test]
fn test_filter_key() {
    let sack = sack(&["system", "fedora"]);
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    query
        .filter_key("name", QueryCmp::Glob, &["glibc*"])
        .unwrap()
        .filter_key("installed", QueryCmp::Eq, &["1"])
        .unwrap();
    assert_eq!(
        nevras(&mut query),
        ["glibc-2.28-9.fc29.x86_64", "glibc-common-2.28-9.fc29.x86_64"]
    );
}

#[test]
fn test_resolve_pkg_spec() {
    let sack = sack(&["system", "fedora", "updates"]);
    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    let (found, nevra) = query
        .resolve_pkg_spec("glibc.x86_64", &ResolveSpecSettings::default())
        .unwrap();
    assert!(found);
    assert_eq!(nevra.unwrap().arch.as_deref(), Some("x86_64"));
    assert_eq!(query.len().unwrap(), 3);

    let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
    query.filter(Filter::Available(true)).unwrap();
    let (found, _) = query
        .resolve_pkg_spec("libc.so.6()(64bit)", &ResolveSpecSettings::default())
        .unwrap();
    assert!(found);
    assert_eq!(query.len().unwrap(), 2);
}
