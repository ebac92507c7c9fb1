//! Route table: which page is mounted at which path

use serde::Serialize;

/// The four dashboard pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum View {
    Dashboard,
    ConfigEditor,
    LogViewer,
    BackupManager,
}

/// Display metadata shown in navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteMeta {
    pub title: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    pub view: View,
    pub meta: RouteMeta,
}

const ROUTES: [Route; 4] = [
    Route {
        path: "/",
        name: "Dashboard",
        view: View::Dashboard,
        meta: RouteMeta {
            title: "Dashboard",
            icon: "mdi-view-dashboard",
        },
    },
    Route {
        path: "/config",
        name: "ConfigEditor",
        view: View::ConfigEditor,
        meta: RouteMeta {
            title: "Config Editor",
            icon: "mdi-file-document-edit",
        },
    },
    Route {
        path: "/logs",
        name: "LogViewer",
        view: View::LogViewer,
        meta: RouteMeta {
            title: "Log Viewer",
            icon: "mdi-text-box-search",
        },
    },
    Route {
        path: "/backup",
        name: "BackupManager",
        view: View::BackupManager,
        meta: RouteMeta {
            title: "Backup Manager",
            icon: "mdi-backup-restore",
        },
    },
];

/// Client-side router. No parameters, no guards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn routes(&self) -> &'static [Route] {
        &ROUTES
    }

    /// Exact match on the path; one trailing slash is ignored
    pub fn resolve(&self, path: &str) -> Option<&'static Route> {
        let path = match path.strip_suffix('/') {
            Some("") | None => path,
            Some(trimmed) => trimmed,
        };
        ROUTES.iter().find(|route| route.path == path)
    }

    pub fn by_name(&self, name: &str) -> Option<&'static Route> {
        ROUTES.iter().find(|route| route.name == name)
    }

    pub fn for_view(&self, view: View) -> &'static Route {
        // every View variant has exactly one entry in ROUTES
        ROUTES
            .iter()
            .find(|route| route.view == view)
            .unwrap_or(&ROUTES[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_routes_in_order() {
        let paths: Vec<_> = Router.routes().iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/", "/config", "/logs", "/backup"]);
    }

    #[test]
    fn test_resolve_exact_paths() {
        assert_eq!(Router.resolve("/").unwrap().view, View::Dashboard);
        assert_eq!(Router.resolve("/config").unwrap().view, View::ConfigEditor);
        assert_eq!(Router.resolve("/logs").unwrap().view, View::LogViewer);
        assert_eq!(Router.resolve("/backup").unwrap().view, View::BackupManager);
    }

    #[test]
    fn test_resolve_ignores_one_trailing_slash() {
        assert_eq!(Router.resolve("/logs/").unwrap().name, "LogViewer");
        assert!(Router.resolve("/logs//").is_none());
    }

    #[test]
    fn test_resolve_unknown_paths() {
        assert!(Router.resolve("/backup/restore").is_none());
        assert!(Router.resolve("config").is_none());
        assert!(Router.resolve("").is_none());
    }

    #[test]
    fn test_route_metadata() {
        let route = Router.by_name("BackupManager").unwrap();
        assert_eq!(route.meta.title, "Backup Manager");
        assert_eq!(route.meta.icon, "mdi-backup-restore");
        assert!(Router.by_name("Settings").is_none());
    }

    #[test]
    fn test_every_view_has_a_route() {
        for view in [
            View::Dashboard,
            View::ConfigEditor,
            View::LogViewer,
            View::BackupManager,
        ] {
            assert_eq!(Router.for_view(view).view, view);
        }
    }
}
