use capstan::prelude::{
    BindingFlags, CtorSpec, Declaration, Finder, GenericCtorSpec, GenericDeclaration, LookupFlags,
    ServiceLocator, TypeSpec,
};

#[derive(Debug)]
struct AppConfig {
    connection: String,
}

#[derive(Debug)]
struct AuditLog {
    target: String,
}

fn main() {
    // Describe the concrete providers and the capabilities they stand behind.
    let declarations = vec![
        Declaration::builder::<AppConfig>("AppConfig", "IConfig")
            .with_ctor(CtorSpec::zero::<AppConfig, _>(|| AppConfig {
                connection: "postgres://localhost/app".into(),
            }))
            .build(),
        // One fresh audit log per lookup; its constructor pulls the config in.
        Declaration::builder::<AuditLog>("AuditLog", "IAuditLog")
            .with_flags(BindingFlags::TRANSIENT)
            .with_ctor(CtorSpec::of(
                vec![TypeSpec::named("IConfig")],
                |deps| AuditLog {
                    target: deps.get::<AppConfig>(0).connection.clone(),
                },
            ))
            .build(),
    ];

    // One open repository family serving every IRepo<..> request.
    let generics = vec![
        GenericDeclaration::builder::<String>("Repo", 1, "IRepo")
            .with_ctor(GenericCtorSpec::zero::<String, _>(|materialized| {
                format!("repository for {materialized}")
            }))
            .build(),
    ];

    // Canonicalize and resolve everything up front.
    let finder = Finder::bootstrap(declarations, generics).expect("Failed to bootstrap finder");

    // Singleton lookups hand back the same canonical instance.
    let config = finder
        .find_as::<AppConfig>(&TypeSpec::named("IConfig"), LookupFlags::empty())
        .expect("Failed to resolve IConfig");
    println!("config: {}", config.connection);

    // Transient lookups rebuild from the cached recipe each time.
    let audit = finder
        .find_as::<AuditLog>(&TypeSpec::named("IAuditLog"), LookupFlags::empty())
        .expect("Failed to resolve IAuditLog");
    println!("audit log writes to: {}", audit.target);

    // Parameterized capabilities materialize on first request, then memoize.
    let users = TypeSpec::parameterized("IRepo", vec![TypeSpec::named("User")]);
    let repo = finder
        .find_as::<String>(&users, LookupFlags::empty())
        .expect("Failed to resolve IRepo<User>");
    println!("generic: {repo}");

    // The locator facade swallows failures for lookup-heavy call sites.
    let locator = ServiceLocator::new(finder);
    match locator.resolve_as::<AppConfig>(&TypeSpec::named("IConfig")) {
        Some(found) => println!("locator: {}", found.connection),
        None => println!("locator: no provider"),
    }

    println!("Resolution completed!");
}
