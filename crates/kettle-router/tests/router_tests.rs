//! Integration tests for kettle-router
//!
//! Exercises the public surface end to end: registration through the
//! annotation processor, dispatch, content negotiation and link generation.

use http::Method;
use kettle_router::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn get(target: &str) -> RouteRequest {
    RouteRequest::get(target).unwrap()
}

fn user_show() -> Routable {
    Routable::new("users.show", "/users/{id}").with_param(Parameter::path("id", ValueKind::Str))
}

fn user_new() -> Routable {
    Routable::new("users.new", "/users/new")
}

fn build(routables: Vec<Routable>) -> Router<&'static str> {
    let mut builder = Router::builder();
    for routable in routables {
        let name = match routable.id().as_str() {
            "users.show" => "show",
            "users.new" => "new",
            _ => "other",
        };
        builder.register(&routable, name).unwrap();
    }
    builder.build()
}

// ============================================================================
// Priority
// ============================================================================

#[test]
fn test_variable_route_registered_first_wins() {
    let router = build(vec![user_show(), user_new()]);
    let matched = router.dispatch(&get("/users/new")).unwrap();

    assert_eq!(matched.id().as_str(), "users.show");
    assert_eq!(matched.arguments().get_str("id"), Some("new"));
}

#[test]
fn test_literal_route_registered_first_wins() {
    let router = build(vec![user_new(), user_show()]);
    let matched = router.dispatch(&get("/users/new")).unwrap();

    assert_eq!(matched.id().as_str(), "users.new");
    assert!(matched.arguments().is_empty());

    let matched = router.dispatch(&get("/users/ada")).unwrap();
    assert_eq!(matched.id().as_str(), "users.show");
}

#[test]
fn test_explicit_priority_overrides_registration_order() {
    let router = build(vec![user_show(), user_new().with_priority(-10)]);
    assert_eq!(
        router.dispatch(&get("/users/new")).unwrap().id().as_str(),
        "users.new"
    );
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_dispatch_no_route() {
    init_tracing();
    let router = build(vec![user_show()]);
    assert_eq!(
        router.dispatch(&get("/posts/1")).unwrap_err(),
        DispatchError::NoRoute {
            path: "/posts/1".into()
        }
    );
}

#[test]
fn test_partial_prefix_is_rejected() {
    let router = build(vec![user_show()]);
    assert!(router.dispatch(&get("/users")).is_err());
    assert!(router.dispatch(&get("/users/1/edit")).is_err());
}

#[test]
fn test_method_restriction() {
    let mut builder = Router::builder();
    builder
        .register(&Routable::new("users.create", "/users").with_method(Method::POST), "create")
        .unwrap()
        .register(&Routable::new("users.index", "/users"), "index")
        .unwrap();
    let router = builder.build();

    assert_eq!(*router.dispatch(&get("/users")).unwrap().handler(), "index");
    let post = get("/users").with_method(Method::POST);
    assert_eq!(*router.dispatch(&post).unwrap().handler(), "create");
}

#[test]
fn test_invoke_handler() {
    let mut builder: RouterBuilder<Box<dyn Fn(&Arguments) -> String + Send + Sync>> = Router::builder();
    builder
        .register(
            &Routable::new("greet", "/hello/{name}").with_param(Parameter::path("name", ValueKind::Str)),
            Box::new(|args: &Arguments| format!("hello {}", args.get_str("name").unwrap_or("?"))),
        )
        .unwrap();
    let router = builder.build();

    let matched = router.dispatch(&get("/hello/J%C3%BCrgen")).unwrap();
    assert_eq!(matched.invoke(), "hello Jürgen");
}

// ============================================================================
// Content negotiation
// ============================================================================

fn report() -> Routable {
    Routable::new("report", "/report")
        .offering(MediaType::json())
        .offering(MediaType::xml())
}

#[test]
fn test_not_acceptable_is_distinct_from_no_route() {
    let router = build(vec![report()]);

    let request = get("/report").with_accept("text/plain");
    assert_eq!(
        router.dispatch(&request).unwrap_err(),
        DispatchError::NotAcceptable {
            path: "/report".into(),
            offered: vec![MediaType::json(), MediaType::xml()],
        }
    );

    let request = get("/missing").with_accept("text/plain");
    assert!(matches!(
        router.dispatch(&request),
        Err(DispatchError::NoRoute { .. })
    ));
}

#[rstest]
#[case("application/json", "application/json")]
#[case("application/xml", "application/xml")]
#[case("application/xml;q=0.5, application/json;q=0.9", "application/json")]
#[case("*/*", "application/json")]
fn test_negotiated_content_type(#[case] accept: &str, #[case] expected: &str) {
    let router = build(vec![report()]);
    let matched = router.dispatch(&get("/report").with_accept(accept)).unwrap();
    assert_eq!(matched.content_type().map(ToString::to_string), Some(expected.to_string()));
}

#[test]
fn test_later_route_can_serve_refused_type() {
    let html = Routable::new("report.html", "/report").offering(MediaType::html());
    let router = build(vec![report(), html]);

    let matched = router.dispatch(&get("/report").with_accept("text/html")).unwrap();
    assert_eq!(matched.id().as_str(), "report.html");
}

// ============================================================================
// Query arguments
// ============================================================================

fn listing() -> Routable {
    Routable::new("posts.index", "/posts").with_param(Parameter::query("page", ValueKind::Int).optional())
}

#[test]
fn test_optional_query_absent() {
    let router = build(vec![listing()]);

    let matched = router.dispatch(&get("/posts")).unwrap();
    assert!(!matched.arguments().contains("page"));
    assert_eq!(router.url_for("posts.index", &Arguments::new()).unwrap(), "/posts");
}

#[test]
fn test_optional_query_present() {
    let router = build(vec![listing()]);

    let matched = router.dispatch(&get("/posts?page=4")).unwrap();
    assert_eq!(matched.arguments().get_int("page"), Some(4));
    assert_eq!(
        router.url_for("posts.index", &Arguments::new().with("page", 4)).unwrap(),
        "/posts?page=4"
    );
}

#[test]
fn test_query_list() {
    let router = build(vec![Routable::new("search", "/search")
        .with_param(Parameter::query("tag", ValueKind::Str).many())]);

    let matched = router.dispatch(&get("/search?tag=a&tag=b%20c")).unwrap();
    assert_eq!(matched.arguments().get("tag"), Some(&Value::from(vec!["a", "b c"])));
    assert_eq!(
        router.url_for("search", matched.arguments()).unwrap(),
        "/search?tag=a&tag=b%20c"
    );
}

#[test]
fn test_strict_query_from_config() {
    let config: Config = toml::from_str("[routing]\nstrict_query = true\n").unwrap();
    let mut builder = RouterBuilder::from_config(config.routing);
    builder.register(&listing(), "posts").unwrap();
    let router = builder.build();

    assert!(router.dispatch(&get("/posts?page=1")).is_ok());
    assert!(router.dispatch(&get("/posts?page=1&debug=1")).is_err());
    assert!(matches!(
        router.dispatch(&get("/posts?page=1&page=2")),
        Err(DispatchError::NoRoute { .. })
    ));
}

#[test]
fn test_repeated_single_query_binds_first_value() {
    let router = build(vec![listing()]);

    let matched = router.dispatch(&get("/posts?page=1&page=2")).unwrap();
    assert_eq!(matched.arguments().get_int("page"), Some(1));
}

// ============================================================================
// Link generation
// ============================================================================

fn archive() -> Routable {
    Routable::new("archive", "/archive/{year}/{month}")
        .with_param(Parameter::path("year", ValueKind::Int))
        .with_param(Parameter::path("month", ValueKind::Int).with_codec(Codec::Padded { width: 2 }))
}

#[test]
fn test_missing_argument_is_named() {
    let router = build(vec![archive()]);
    assert_eq!(
        router.reverse("archive", &Arguments::new().with("year", 2024)),
        Err(UnselectionFailure::MissingArgument {
            name: "month".into()
        })
    );
}

#[test]
fn test_extra_argument_is_named() {
    let router = build(vec![archive()]);
    let arguments = Arguments::new().with("year", 2024).with("month", 3).with("day", 9);
    assert_eq!(
        router.reverse("archive", &arguments),
        Err(UnselectionFailure::UnexpectedArguments {
            names: vec!["day".into()]
        })
    );
}

#[rstest]
#[case(Arguments::new().with("year", 2024).with("month", 3), "/archive/2024/03")]
#[case(Arguments::new().with("year", -1).with("month", 12), "/archive/-1/12")]
fn test_round_trip(#[case] arguments: Arguments, #[case] expected: &str) {
    let router = build(vec![archive()]);

    let link = router.verify_link("archive", &arguments).unwrap();
    assert_eq!(link.to_string(), expected);

    let matched = router.dispatch(&get(expected)).unwrap();
    assert_eq!(matched.arguments(), &arguments);
}

#[test]
fn test_link_carries_method_and_content_type() {
    let routable = Routable::new("users.update", "/users/{id}")
        .with_param(Parameter::path("id", ValueKind::Int))
        .with_method(Method::PUT)
        .offering(MediaType::json());
    let router = build(vec![routable]);

    let link = router.verify_link("users.update", &Arguments::new().with("id", 5)).unwrap();
    assert_eq!(link.method(), Some(&Method::PUT));
    assert_eq!(link.content_types(), &[MediaType::json()]);
}

#[test]
fn test_header_parameter_round_trip() {
    let routable = Routable::new("tenant.home", "/")
        .with_param(Parameter::header("X-Tenant", "tenant", ValueKind::Str));
    let router = build(vec![routable]);

    let arguments = Arguments::new().with("tenant", "acme");
    let link = router.verify_link("tenant.home", &arguments).unwrap();
    assert_eq!(link.headers(), &[("x-tenant".to_string(), "acme".to_string())]);
    assert_eq!(link.to_string(), "/");
}

#[test]
fn test_cookie_parameter_round_trip() {
    let routable = Routable::new("cart.show", "/cart")
        .with_param(Parameter::cookie("sid", "session", ValueKind::Str))
        .with_param(Parameter::cookie("currency", "currency", ValueKind::Str).with_default("EUR"));
    let router = build(vec![routable]);

    let arguments = Arguments::new().with("session", "s 1");
    let link = router.verify_link("cart.show", &arguments).unwrap();
    assert_eq!(link.headers(), &[("cookie".to_string(), "sid=s%201".to_string())]);

    let request = get("/cart")
        .try_with_header("cookie", "currency=USD; sid=abc")
        .unwrap();
    let matched = router.dispatch(&request).unwrap();
    assert_eq!(matched.arguments().get_str("session"), Some("abc"));
    assert_eq!(matched.arguments().get_str("currency"), Some("USD"));

    assert!(router.dispatch(&get("/cart")).is_err());
}

#[test]
fn test_default_fills_in_on_dispatch_and_round_trips() {
    let routable = Routable::new("feed", "/feed")
        .with_param(Parameter::query("format", ValueKind::Str).with_default("rss"));
    let router = build(vec![routable]);

    let matched = router.dispatch(&get("/feed")).unwrap();
    assert_eq!(matched.arguments().get_str("format"), Some("rss"));

    assert_eq!(router.url_for("feed", &Arguments::new()).unwrap(), "/feed");
    assert!(router.verify_link("feed", &Arguments::new().with("format", "atom")).is_ok());
}

#[test]
fn test_shadowed_link_fails_verification() {
    // `users.new` can never be reached while `users.show` comes first
    let router = build(vec![user_show(), user_new()]);

    assert_eq!(router.url_for("users.new", &Arguments::new()).unwrap(), "/users/new");
    assert_eq!(
        router.verify_link("users.new", &Arguments::new()),
        Err(UnselectionFailure::RoundTrip {
            id: "users.new".into(),
            routed: Some("users.show".into()),
        })
    );
}

#[test]
fn test_validate_links_collects_every_failure() {
    let router = build(vec![user_show(), user_new(), archive()]);
    let good = Arguments::new().with("id", "ada");
    let empty = Arguments::new();
    let partial = Arguments::new().with("year", 1999);

    let failures = router
        .validate_links([
            ("users.show", &good),
            ("users.new", &empty),
            ("archive", &partial),
            ("nope", &empty),
        ])
        .unwrap_err();

    let ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["users.new", "archive", "nope"]);
    assert!(matches!(failures[2].1, UnselectionFailure::UnknownRoutable { .. }));
}

// ============================================================================
// Wildcards
// ============================================================================

#[test]
fn test_wildcard_path() {
    let routable = Routable::new("files", "/files/{path*}")
        .with_param(Parameter::path("path", ValueKind::Str));
    let router = build(vec![routable]);

    let matched = router.dispatch(&get("/files/docs/guide%20v2.md")).unwrap();
    assert_eq!(
        matched.arguments().get("path"),
        Some(&Value::from(vec!["docs", "guide v2.md"]))
    );
    assert!(router.dispatch(&get("/files")).is_err());

    assert_eq!(
        router.url_for("files", matched.arguments()).unwrap(),
        "/files/docs/guide%20v2.md"
    );
}

#[test]
fn test_long_wildcard_path_on_small_stack() {
    let routable = Routable::new("files", "/files/{path*}")
        .with_param(Parameter::path("path", ValueKind::Str));
    let router = build(vec![routable]);

    let handle = std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || {
            let target = format!("/files{}", "/a".repeat(5000));
            let matched = router.dispatch(&get(&target)).unwrap();
            let parts = matched.arguments().get_list("path").map(<[Value]>::len);
            let link = router.url_for("files", matched.arguments()).unwrap();
            (parts, link == target)
        })
        .unwrap();

    assert_eq!(handle.join().unwrap(), (Some(5000), true));
}
