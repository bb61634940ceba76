use crate::models::{NavEntry, NavView, Principal, Role};

// Menus per role, in display order. The first entry is the role's landing page.

const STUDENT_NAV: &[NavEntry] = &[
    NavEntry::new("Inicio", "/home"),
    NavEntry::new("Actividades", "/actividades"),
    NavEntry::new("Fondos", "/fondos"),
    NavEntry::new("Mis Inscripciones", "/mis-inscripciones"),
    NavEntry::new("Enviar Requerimiento", "/requerimiento"),
    NavEntry::new("Consejeros", "/ver-consejeros"),
    NavEntry::new("Notificaciones", "/notificaciones"),
];

const ADVISOR_NAV: &[NavEntry] = &[
    NavEntry::new("Inicio", "/consejero"),
    NavEntry::new("Requerimientos Recibidos", "/consejero/requerimientos-recibidos"),
    NavEntry::new("Crear Propuesta", "/consejero/crear-propuesta"),
    NavEntry::new("Mis Propuestas", "/consejero/mis-propuestas"),
    NavEntry::new("Actividades", "/consejero/actividades"),
    NavEntry::new("Chats", "/consejero/historial-chats"),
    NavEntry::new("Notificaciones", "/notificaciones"),
];

const COORDINATOR_NAV: &[NavEntry] = &[
    NavEntry::new("Inicio", "/coordinador"),
    NavEntry::new("Actividades", "/coordinador/actividades"),
    NavEntry::new("Consejeros", "/coordinador/consejeros"),
    NavEntry::new("Revisar Propuestas", "/coordinador/revisar-propuestas"),
    NavEntry::new("Historial de chats", "/coordinador/historial-chats"),
    NavEntry::new("Notificaciones", "/notificaciones"),
];

/// Navigation entries for `role`; no role means no menu.
pub fn entries_for(role: Option<Role>) -> &'static [NavEntry] {
    match role {
        Some(Role::Student) => STUDENT_NAV,
        Some(Role::Advisor) => ADVISOR_NAV,
        Some(Role::Coordinator) => COORDINATOR_NAV,
        None => &[],
    }
}

/// Where a principal with `role` lands after signing in. Matches the first menu entry.
pub fn home_path(role: Role) -> &'static str {
    match role {
        Role::Student => "/home",
        Role::Advisor => "/consejero",
        Role::Coordinator => "/coordinador",
    }
}

impl NavView {
    /// derive
    ///
    /// Builds the navbar view state for a principal. Signed-out principals and principals
    /// without a role get an empty menu.
    pub fn derive(principal: Option<&Principal>, role: Option<Role>, unread: i64) -> Self {
        let role = principal.and(role);
        Self {
            email: principal.and_then(|p| p.email.clone()),
            role,
            entries: entries_for(role).to_vec(),
            home: role.map(|r| home_path(r).to_string()),
            unread_notifications: if principal.is_some() { unread.max(0) } else { 0 },
        }
    }
}
