//! End-to-end tests for `openstack-inventory` against stub Keystone/Nova/Glance

mod common;

use common::{run_bin, Route, StubServer};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const OPENSTACK: &str = env!("CARGO_BIN_EXE_openstack-inventory");

fn keystone(base: &str) -> Route {
    Route::json(
        "POST",
        "/identity/v3/auth/tokens",
        json!({"token": {
            "project": {"id": "p-1", "name": "demo"},
            "catalog": [
                {"type": "compute", "endpoints": [
                    {"interface": "public", "region": "RegionOne", "url": format!("{}/compute/v2.1", base)}
                ]},
                {"type": "image", "endpoints": [
                    {"interface": "public", "region": "RegionOne", "url": format!("{}/image", base)}
                ]}
            ]
        }}),
    )
    .with_status(201)
    .with_header("X-Subject-Token", "tok-123")
}

fn cloud() -> StubServer {
    StubServer::start(|base| {
        vec![
            keystone(base),
            Route::json(
                "GET",
                "/compute/v2.1/servers/detail",
                json!({"servers": [
                    {
                        "id": "s-1",
                        "name": "web1",
                        "status": "ACTIVE",
                        "metadata": {"group": "webservers", "groups": "prod,eu"},
                        "flavor": {"id": "f-1"},
                        "image": {"id": "i-1"},
                        "addresses": {"private": [
                            {"addr": "10.0.0.5", "version": 4, "OS-EXT-IPS:type": "fixed"},
                            {"addr": "203.0.113.9", "version": 4, "OS-EXT-IPS:type": "floating"}
                        ]},
                        "OS-EXT-AZ:availability_zone": "az1"
                    },
                    {
                        "id": "s-2",
                        "name": "builder",
                        "status": "BUILD",
                        "metadata": {},
                        "flavor": {"id": "f-1"},
                        "image": "",
                        "addresses": {}
                    }
                ]}),
            ),
            Route::json(
                "GET",
                "/compute/v2.1/flavors/detail",
                json!({"flavors": [{"id": "f-1", "name": "m1.small"}]}),
            ),
            Route::json(
                "GET",
                "/image/v2/images",
                json!({"images": [{"id": "i-1", "name": "ubuntu"}]}),
            ),
        ]
    })
}

fn write_clouds_yaml(dir: &Path, auth_url: &str, cache_dir: &Path, expiration: u64) {
    fs::write(
        dir.join("clouds.yaml"),
        format!(
            "clouds:\n  mycloud:\n    region_name: RegionOne\n    auth:\n      auth_url: {}\n      username: demo\n      password: secret\n      project_name: demo\ncache:\n  expiration_time: {}\n  path: {}\n",
            auth_url,
            expiration,
            cache_dir.display()
        ),
    )
    .unwrap();
}

#[test]
fn test_list_groups_servers() {
    let server = cloud();
    let work = TempDir::new().unwrap();
    let cache_dir = work.path().join("cache");
    write_clouds_yaml(
        work.path(),
        &format!("{}/identity", server.url()),
        &cache_dir,
        0,
    );

    let output = run_bin(
        OPENSTACK,
        &["--cloud", "mycloud", "--refresh"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let inventory: Value = serde_json::from_slice(&output.stdout).unwrap();
    for group in [
        "mycloud",
        "RegionOne",
        "mycloud_RegionOne",
        "webservers",
        "prod",
        "eu",
        "web1",
        "flavor-m1.small",
        "image-ubuntu",
        "az1",
        "RegionOne_az1",
        "mycloud_RegionOne_az1",
    ] {
        assert_eq!(inventory[group]["hosts"], json!(["web1"]), "group {}", group);
    }
    assert!(inventory.get("builder").is_none(), "server without address is skipped");

    let web1 = &inventory["all"]["hostvars"]["web1"];
    assert_eq!(web1["interface_ip"], "203.0.113.9");
    assert_eq!(web1["private_v4"], "10.0.0.5");
    assert_eq!(web1["location"]["project"]["id"], "p-1");

    let cached = fs::read_to_string(
        work.path()
            .join("cache_mycloud")
            .join("jeti-inventory.cache"),
    )
    .unwrap();
    assert_eq!(cached.trim_end(), String::from_utf8_lossy(&output.stdout).trim_end());

    let requests = server.requests();
    let servers_call = requests
        .iter()
        .find(|r| r.path == "/compute/v2.1/servers/detail")
        .expect("servers listed");
    assert_eq!(servers_call.header("x-auth-token"), Some("tok-123"));
    let auth_call = requests
        .iter()
        .find(|r| r.method == "POST")
        .expect("keystone called");
    let auth_body: Value = serde_json::from_str(&auth_call.body).unwrap();
    assert_eq!(auth_body["auth"]["identity"]["password"]["user"]["name"], "demo");
}

fn paged_cloud() -> StubServer {
    StubServer::start(|base| {
        vec![
            keystone(base),
            Route::json(
                "GET",
                "/compute/v2.1/servers/detail",
                json!({
                    "servers": [{
                        "id": "s-1",
                        "name": "web1",
                        "flavor": {"id": "f-1"},
                        "image": {"id": "i-1"},
                        "addresses": {"public": [{"addr": "203.0.113.9", "version": 4}]}
                    }],
                    "servers_links": [{
                        "rel": "next",
                        "href": format!("{}/compute/v2.1/servers/detail?marker=s-1", base)
                    }]
                }),
            ),
            Route::json(
                "GET",
                "/compute/v2.1/servers/detail?marker=s-1",
                json!({"servers": [{
                    "id": "s-2",
                    "name": "db1",
                    "flavor": {"id": "f-2"},
                    "image": {"id": "i-26"},
                    "addresses": {"public": [{"addr": "203.0.113.10", "version": 4}]}
                }]}),
            ),
            Route::json(
                "GET",
                "/compute/v2.1/flavors/detail",
                json!({
                    "flavors": [{"id": "f-1", "name": "m1.small"}],
                    "flavors_links": [{
                        "rel": "next",
                        "href": format!("{}/compute/v2.1/flavors/detail?marker=f-1", base)
                    }]
                }),
            ),
            Route::json(
                "GET",
                "/compute/v2.1/flavors/detail?marker=f-1",
                json!({"flavors": [{"id": "f-2", "name": "m1.large"}]}),
            ),
            Route::json(
                "GET",
                "/image/v2/images",
                json!({"images": [{"id": "i-1", "name": "ubuntu"}], "next": "/v2/images?marker=i-1"}),
            ),
            Route::json(
                "GET",
                "/image/v2/images?marker=i-1",
                json!({"images": [{"id": "i-26", "name": "centos"}]}),
            ),
        ]
    })
}

#[test]
fn test_listing_follows_pagination_links() {
    let server = paged_cloud();
    let work = TempDir::new().unwrap();
    write_clouds_yaml(
        work.path(),
        &format!("{}/identity", server.url()),
        &work.path().join("cache"),
        0,
    );

    let output = run_bin(
        OPENSTACK,
        &["--list"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let inventory: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(inventory["mycloud"]["hosts"], json!(["web1", "db1"]));
    assert_eq!(inventory["image-ubuntu"]["hosts"], json!(["web1"]));
    assert_eq!(inventory["image-centos"]["hosts"], json!(["db1"]));
    assert_eq!(inventory["flavor-m1.large"]["hosts"], json!(["db1"]));
    assert_eq!(inventory["all"]["hostvars"]["db1"]["image"]["name"], "centos");

    let image_queries: Vec<Option<String>> = server
        .requests()
        .into_iter()
        .filter(|r| r.path == "/image/v2/images")
        .map(|r| r.query)
        .collect();
    assert_eq!(image_queries, vec![None, Some("marker=i-1".to_string())]);
}

#[test]
fn test_failing_cloud_skipped_when_errors_allowed() {
    let server = cloud();
    let work = TempDir::new().unwrap();
    fs::write(
        work.path().join("clouds.yaml"),
        format!(
            "clouds:\n  good:\n    region_name: RegionOne\n    auth:\n      auth_url: {}/identity\n      username: demo\n      password: secret\n  down:\n    auth:\n      auth_url: http://127.0.0.1:9/v3\ncache:\n  path: {}\njeti:\n  fail_on_errors: false\n",
            server.url(),
            work.path().join("cache").display()
        ),
    )
    .unwrap();

    let output = run_bin(
        OPENSTACK,
        &["--list"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let inventory: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(inventory["good"]["hosts"], json!(["web1"]));
    assert!(inventory.get("down").is_none());
    assert_eq!(inventory["all"]["hostvars"]["web1"]["cloud"], "good");
    assert!(String::from_utf8_lossy(&output.stderr).contains("down/"));
}

#[test]
fn test_private_flag_uses_private_address() {
    let server = cloud();
    let work = TempDir::new().unwrap();
    write_clouds_yaml(
        work.path(),
        &format!("{}/identity", server.url()),
        &work.path().join("cache"),
        0,
    );

    let output = run_bin(
        OPENSTACK,
        &["--private", "--host", "web1"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let hostvars: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(hostvars["interface_ip"], "10.0.0.5");
}

#[test]
fn test_fresh_cache_is_served_without_network() {
    let work = TempDir::new().unwrap();
    let cache_dir = work.path().join("cache");
    write_clouds_yaml(work.path(), "http://127.0.0.1:9/v3", &cache_dir, 3600);

    let cached = json!({
        "all": {"hostvars": {"db1": {"id": "x", "interface_ip": "10.1.1.1"}}},
        "db1": {"hosts": ["db1"]}
    });
    let per_cloud = work.path().join("cache_mycloud");
    fs::create_dir_all(&per_cloud).unwrap();
    fs::write(per_cloud.join("jeti-inventory.cache"), cached.to_string()).unwrap();

    let env = [("HOME", work.path().to_str().unwrap()), ("OS_CLOUD", "mycloud")];

    let list = run_bin(OPENSTACK, &["--list"], &env, Some(work.path()));
    assert!(list.status.success(), "stderr: {}", String::from_utf8_lossy(&list.stderr));
    let listed: Value = serde_json::from_slice(&list.stdout).unwrap();
    assert_eq!(listed, cached);

    let host = run_bin(OPENSTACK, &["--host", "db1"], &env, Some(work.path()));
    assert!(host.status.success());
    let hostvars: Value = serde_json::from_slice(&host.stdout).unwrap();
    assert_eq!(hostvars["interface_ip"], "10.1.1.1");

    let unknown = run_bin(OPENSTACK, &["--host", "nope"], &env, Some(work.path()));
    assert_eq!(serde_json::from_slice::<Value>(&unknown.stdout).unwrap(), json!({}));
}

#[test]
fn test_unknown_cloud_fails() {
    let work = TempDir::new().unwrap();
    write_clouds_yaml(work.path(), "http://127.0.0.1:9/v3", &work.path().join("cache"), 0);

    let output = run_bin(
        OPENSTACK,
        &["--cloud", "nope"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cloud nope was not found."));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unreachable_cloud_fails() {
    let work = TempDir::new().unwrap();
    write_clouds_yaml(work.path(), "http://127.0.0.1:9/v3", &work.path().join("cache"), 0);

    let output = run_bin(
        OPENSTACK,
        &["--refresh"],
        &[("HOME", work.path().to_str().unwrap())],
        Some(work.path()),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("mycloud/RegionOne"));
}
