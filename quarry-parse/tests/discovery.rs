//! End-to-end discovery tests over on-disk fixture trees.

use std::fs;

use quarry_core::{AppRoot, load_packages};
use quarry_graph::{
    BindKind, BindTarget, CronSchedule, ResourceData, ResourceGraph, ResourceKind,
};
use quarry_parse::{DiscoveryConfig, DiscoveryError, FatalError, codes, run_discovery};
use tempfile::TempDir;

/// A fixture application: a temp tree plus its discovery config.
struct App {
    _temp: TempDir,
    config: DiscoveryConfig,
    packages: Vec<quarry_core::Package>,
}

impl App {
    fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }

        let app_root = AppRoot::new(temp.path());
        let packages = load_packages(&app_root, "testapp").unwrap();
        let config = DiscoveryConfig {
            app_root,
            app_name: "testapp".to_string(),
            namespace: "quarry".to_string(),
            docs_base_url: "https://quarry.dev/docs".to_string(),
        };
        Self {
            _temp: temp,
            config,
            packages,
        }
    }

    fn discover(&self) -> Result<ResourceGraph, DiscoveryError> {
        run_discovery(&self.config, &self.packages)
    }

    fn graph(&self) -> ResourceGraph {
        match self.discover() {
            Ok(graph) => graph,
            Err(DiscoveryError::Invalid { report, .. }) => {
                panic!("expected a clean run, got:\n{report}")
            }
            Err(err) => panic!("expected a clean run, got: {err}"),
        }
    }

    fn failure(&self) -> (Vec<&'static str>, String) {
        match self.discover() {
            Err(DiscoveryError::Invalid {
                diagnostics,
                report,
            }) => (diagnostics.iter().map(|d| d.code).collect(), report),
            Ok(_) => panic!("expected diagnostics, run was clean"),
            Err(err) => panic!("expected diagnostics, got: {err}"),
        }
    }
}

const BLOG_API: &str = "\
// Get a post by id.
//quarry:api public method=GET path=/posts/:id
func GetPost(ctx Context, id string, p *GetReq) (*Post, error) {
\treturn nil
}

// Send the welcome email.
//quarry:api
func SendWelcome(ctx Context) error {
\treturn nil
}
";

#[test]
fn full_application_builds_a_graph() {
    let app = App::new(&[
        ("quarry.toml", "[app]\nname = \"testapp\"\n"),
        ("blog/api.qy", BLOG_API),
        (
            "blog/cron.qy",
            "var welcome = cron.NewJob(\"welcome\", title=\"Welcome email\", every=2h, endpoint=SendWelcome)\n",
        ),
        ("blog/migrations/1_init.up.sql", "create table posts (id text);"),
        ("blog/migrations/2_tags.up.sql", "create table tags (id text);"),
        (
            "users/pubsub.qy",
            "var signups = pubsub.NewTopic(\"signups\", message=Signup, delivery=exactly_once)\n\
             var notify = pubsub.NewSubscription(signups, \"notify\", handler=blog.SendWelcome)\n",
        ),
        (
            "users/infra.qy",
            "var gw = gateway.New(\"main\", hostnames=\"api.example.com\")\n\
             var avatars = objects.NewBucket(\"avatars\", versioned)\n\
             var token = secrets.Secret(GithubToken)\n",
        ),
    ]);

    let graph = app.graph();
    let ids: Vec<&str> = graph.resources().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "api:blog.GetPost",
            "api:blog.SendWelcome",
            "bucket:users.avatars",
            "cron:blog.welcome",
            "gateway:users.main",
            "secret:users.GithubToken",
            "sqldb:blog",
            "subscription:users.notify",
            "topic:users.signups",
        ],
    );

    // Endpoint payload.
    let get_post = graph
        .lookup("blog", "GetPost", ResourceKind::ApiEndpoint)
        .unwrap();
    let ResourceData::ApiEndpoint(api) = &get_post.data else {
        panic!("expected endpoint");
    };
    assert_eq!(api.path.to_string(), "/posts/:id");
    assert_eq!(api.methods, vec!["GET"]);
    assert_eq!(api.path_params, vec!["id"]);
    assert_eq!(get_post.doc.as_deref(), Some("Get a post by id."));

    // Cron schedule decoded to whole minutes; endpoint reference resolves.
    let welcome = graph.lookup("blog", "welcome", ResourceKind::CronJob).unwrap();
    let ResourceData::CronJob(job) = &welcome.data else {
        panic!("expected cron job");
    };
    assert_eq!(job.schedule, CronSchedule::Every(120));
    assert!(graph.resolve_endpoint(&job.endpoint).is_some());

    // Migration history is ordered and contiguous.
    let db = graph.lookup("blog", "blog", ResourceKind::SqlDatabase).unwrap();
    let ResourceData::SqlDatabase(db) = &db.data else {
        panic!("expected database");
    };
    assert_eq!(db.migration_dir, "blog/migrations");
    let numbers: Vec<u64> = db.migrations.iter().map(|m| m.number).collect();
    assert_eq!(numbers, vec![1, 2]);

    // The database gets its implicit package bind.
    let implicit = graph.binds().iter().any(|b| {
        b.kind == BindKind::Implicit
            && matches!(&b.target, BindTarget::Id(id) if id.as_str() == "sqldb:blog")
    });
    assert!(implicit);
}

#[test]
fn endpoint_and_topic_may_share_a_name() {
    // Their ids differ, so the shared name is legal and the cron job's
    // reference still lands on the endpoint.
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        (
            "blog/infra.qy",
            "var welcomes = pubsub.NewTopic(\"SendWelcome\", message=Welcome)\n\
             var job = cron.NewJob(\"welcome\", every=5m, endpoint=SendWelcome)\n",
        ),
    ]);

    let graph = app.graph();
    let ids: Vec<&str> = graph.resources().iter().map(|r| r.id.as_str()).collect();
    assert!(ids.contains(&"api:blog.SendWelcome"));
    assert!(ids.contains(&"topic:blog.SendWelcome"));

    let job = graph.lookup("blog", "welcome", ResourceKind::CronJob).unwrap();
    let ResourceData::CronJob(job) = &job.data else {
        panic!("expected cron job");
    };
    let target = graph.resolve_endpoint(&job.endpoint).unwrap();
    assert!(matches!(target.data, ResourceData::ApiEndpoint(_)));
}

#[test]
fn missing_migration_names_the_expected_number() {
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/1_init.up.sql", "select 1;"),
        ("blog/migrations/3_later.up.sql", "select 1;"),
    ]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::MISSING_MIGRATION]);
    assert!(report.contains("missing migration with number 2"));
    assert!(report.contains("blog/migrations/3_later.up.sql"));
}

#[test]
fn duplicate_migration_names_the_number() {
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/1_init.up.sql", "select 1;"),
        ("blog/migrations/1_again.up.sql", "select 1;"),
    ]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::DUPLICATE_MIGRATION]);
    assert!(report.contains("duplicate migration with number 1"));
}

#[test]
fn duplicate_migration_without_the_first_still_names_the_duplicate() {
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/2_a.up.sql", "select 1;"),
        ("blog/migrations/2_b.up.sql", "select 1;"),
    ]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::DUPLICATE_MIGRATION]);
    assert!(report.contains("duplicate migration with number 2"));
    assert!(report.contains("blog/migrations/2_b.up.sql"));
    assert!(!report.contains("missing migration"));
}

#[test]
fn migration_description_is_mandatory_and_dot_free() {
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/1_.up.sql", "select 1;"),
        ("blog/migrations/2_a.b.up.sql", "select 1;"),
        ("blog/migrations/3_x.UP.SQL", "select 1;"),
    ]);

    let (codes, report) = app.failure();
    assert_eq!(
        codes,
        vec![
            codes::INVALID_MIGRATION_FILENAME,
            codes::INVALID_MIGRATION_FILENAME,
            codes::INVALID_MIGRATION_FILENAME,
        ],
    );
    assert!(report.contains("'1_.up.sql'"));
    assert!(report.contains("'2_a.b.up.sql'"));
    assert!(report.contains("'3_x.UP.SQL'"));
}

#[test]
fn clean_migrations_outside_a_service_declare_no_database() {
    // The docs folder has no service markers, and the blog service's
    // migration folder holds no migrations: neither declares a database.
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/notes.txt", "remember to add an index"),
        ("docs/migrations/1_init.up.sql", "select 1;"),
    ]);

    let graph = app.graph();
    assert!(graph.of_kind(ResourceKind::SqlDatabase).next().is_none());
}

#[test]
fn migration_problems_in_non_service_packages_are_tolerated() {
    // No directives anywhere: the package does not look like a service, so
    // the malformed migration directory is skipped instead of failing.
    let app = App::new(&[("docs/migrations/not-a-migration.sql", "select 1;")]);

    let graph = app.graph();
    assert!(graph.resources().is_empty());
}

#[test]
fn malformed_migration_filename_in_a_service() {
    let app = App::new(&[
        ("blog/api.qy", BLOG_API),
        ("blog/migrations/init.sql", "select 1;"),
    ]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::INVALID_MIGRATION_FILENAME]);
    assert!(report.contains("invalid migration filename 'init.sql'"));
    assert!(report.contains("<number>_<description>.up.sql"));
}

#[test]
fn path_params_must_match_handler_params() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api public path=/posts/:slug\n\
         func GetPost(ctx Context, id string, p *Req) error {\n\
         }\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::PATH_PARAM_MISMATCH]);
    // One diagnostic names both sides of the mismatch.
    assert!(report.contains("path declares slug"));
    assert!(report.contains("handler binds id"));
}

#[test]
fn invalid_signature_lists_the_accepted_shapes() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api\nfunc Bad(p *Req, ctx Context) error {\n}\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::INVALID_ENDPOINT_SIGNATURE]);
    assert!(report.contains("invalid signature for endpoint Bad"));
    assert!(report.contains("func(ctx Context) error"));
    assert!(report.contains("func(ctx Context, p *Request) (*Response, error)"));
}

#[test]
fn raw_endpoints_must_be_public() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api raw\nfunc Hook(ctx Context, req *Request) error {\n\treturn nil\n}\n",
    )]);

    let (_, report) = app.failure();
    insta::assert_snapshot!(report, @r"
    ── raw endpoint is private ─────────────────────[quarry::raw_endpoint_private]
      --> blog/api.qy:1:14
       |
     1 | //quarry:api raw
       |              ^^^ declared raw here

      hint: raw endpoints must be public
            https://quarry.dev/docs/primitives/raw-endpoints
    ");
}

#[test]
fn cron_construction_outside_a_var_is_rejected() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api\n\
         func SendWelcome(ctx Context) error {\n\
         \treturn nil\n\
         }\n\
         \n\
         func Setup(ctx Context) error {\n\
         \tcron.NewJob(\"sneaky\", endpoint=SendWelcome)\n\
         \tSendWelcome(ctx)\n\
         \treturn nil\n\
         }\n",
    )]);

    // Both the illegal construction site and the direct endpoint call are
    // reported in the same run.
    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::CRON_ILLEGAL_CALL_SITE, codes::ENDPOINT_CALLED]);
    assert!(report.contains("cron job constructed outside a package-level variable"));
    assert!(report.contains("endpoint called directly"));
    assert!(report.contains("endpoints may only be referenced, not called"));
}

#[test]
fn endpoint_called_as_a_var_initializer_is_rejected() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api\n\
         func SendWelcome(ctx Context) error {\n\
         \treturn nil\n\
         }\n\
         \n\
         var welcome = SendWelcome(ctx)\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::ENDPOINT_CALLED]);
    assert!(report.contains("endpoint called directly"));
    assert!(report.contains("blog.SendWelcome called here"));
}

#[test]
fn cron_schedule_rules() {
    let app = App::new(&[(
        "blog/cron.qy",
        "//quarry:api\nfunc Run(ctx Context) error {\n}\n\
         var a = cron.NewJob(\"a\", every=90s, endpoint=Run)\n\
         var b = cron.NewJob(\"b\", every=5m, schedule=0 * * * *, endpoint=Run)\n\
         var c = cron.NewJob(\"c\", endpoint=Run)\n",
    )]);

    let (codes, _) = app.failure();
    assert_eq!(
        codes,
        vec![
            codes::INVALID_CRON_SCHEDULE,
            codes::INVALID_CRON_SCHEDULE,
            codes::INVALID_CRON_SCHEDULE,
        ],
    );
}

#[test]
fn cron_endpoint_must_resolve() {
    let app = App::new(&[(
        "blog/cron.qy",
        "var job = cron.NewJob(\"job\", every=5m, endpoint=Missing)\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::UNKNOWN_ENDPOINT]);
    assert!(report.contains("unknown endpoint blog.Missing"));
}

#[test]
fn subscription_handler_must_resolve() {
    let app = App::new(&[(
        "users/pubsub.qy",
        "var signups = pubsub.NewTopic(\"signups\", message=Signup)\n\
         var notify = pubsub.NewSubscription(signups, \"notify\", handler=Gone)\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::UNKNOWN_ENDPOINT]);
    assert!(report.contains("unknown endpoint users.Gone"));
}

#[test]
fn cors_allow_list_and_unsafe_all_conflict() {
    let app = App::new(&[(
        "gw/infra.qy",
        "var gw = gateway.New(\"main\", allow_origins_with_credentials=\"https://a.example\", allow_unsafe_all_origins_with_credentials)\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::INVALID_CORS]);
    assert!(report.contains("allow-list set here"));
    assert!(report.contains("unsafe-allow-all set here"));
}

#[test]
fn orphan_directive_is_an_error() {
    let app = App::new(&[(
        "blog/api.qy",
        "//quarry:api public\n\nfunc GetPost(ctx Context) error {\n}\n",
    )]);

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::INVALID_DIRECTIVE]);
    assert!(report.contains("directive is not attached to a declaration"));
}

#[test]
fn duplicate_resource_id_is_fatal() {
    let app = App::new(&[
        ("blog/a.qy", "//quarry:api\nfunc Ping(ctx Context) error {\n}\n"),
        ("blog/b.qy", "//quarry:api\nfunc Ping(ctx Context) error {\n}\n"),
    ]);

    match app.discover() {
        Err(DiscoveryError::Fatal(FatalError::DuplicateResource { id })) => {
            assert_eq!(id, "api:blog.Ping");
        }
        other => panic!("expected a fatal duplicate id, got: {other:?}"),
    }
}

#[test]
fn discovery_is_idempotent_and_deterministic() {
    let files: &[(&str, &str)] = &[
        ("a/api.qy", "//quarry:api public path=/a/:x\nfunc A(ctx Context) error {\n}\n"),
        ("b/api.qy", "//quarry:api public path=/b/:y\nfunc B(ctx Context) error {\n}\n"),
        ("c/api.qy", "//quarry:api public path=/c/:z\nfunc C(ctx Context) error {\n}\n"),
        ("a/migrations/2_skip.up.sql", "select 1;"),
    ];

    // Several packages in parallel, several diagnostics: the report must
    // come out byte-identical regardless of thread interleaving.
    let first = App::new(files).failure().1;
    for _ in 0..4 {
        assert_eq!(App::new(files).failure().1, first);
    }

    // Re-running over the same loaded packages is idempotent too.
    let app = App::new(files);
    assert_eq!(app.failure().1, app.failure().1);
}

#[test]
fn unreadable_source_fails_without_stopping_the_run() {
    let app = App::new(&[("blog/api.qy", BLOG_API)]);

    // Replace the file with a directory after package loading: reads fail.
    let path = app.config.app_root.join("blog/api.qy");
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    let (codes, report) = app.failure();
    assert_eq!(codes, vec![codes::SOURCE_UNREADABLE]);
    assert!(report.contains("cannot read source file of package 'blog'"));
}
