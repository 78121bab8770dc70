//! Resource kinds served by the backend and name resolution for the CLI.

use std::fmt;

/// Every REST resource the dashboard synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
  Projects,
  Tasks,
  Activities,
  Labor,
  Materials,
  Equipment,
  Warehouses,
  Requests,
  Approvals,
  Departments,
  Roles,
  Notifications,
  Kpis,
  Tags,
  Users,
  Dispatches,
  Issues,
  StoreRequisitions,
  RequestDeliveries,
  WorkflowLogs,
  Budgets,
  Invoices,
  Payrolls,
}

#[derive(Debug, Clone)]
pub struct KindInfo {
  pub kind: ResourceKind,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  /// REST collection path, relative to the API base URL
  pub path: &'static str,
  /// Singular label for notices
  pub label: &'static str,
}

/// All known resources
pub const KINDS: &[KindInfo] = &[
  KindInfo {
    kind: ResourceKind::Projects,
    name: "projects",
    aliases: &["p", "project"],
    path: "/projects",
    label: "Project",
  },
  KindInfo {
    kind: ResourceKind::Tasks,
    name: "tasks",
    aliases: &["t", "task"],
    path: "/tasks",
    label: "Task",
  },
  KindInfo {
    kind: ResourceKind::Activities,
    name: "activities",
    aliases: &["a", "activity"],
    path: "/activities",
    label: "Activity",
  },
  KindInfo {
    kind: ResourceKind::Labor,
    name: "labor",
    aliases: &["labour", "workers"],
    path: "/labors",
    label: "Labor",
  },
  KindInfo {
    kind: ResourceKind::Materials,
    name: "materials",
    aliases: &["m", "material"],
    path: "/materials",
    label: "Material",
  },
  KindInfo {
    kind: ResourceKind::Equipment,
    name: "equipment",
    aliases: &["e", "equipments"],
    path: "/equipments",
    label: "Equipment",
  },
  KindInfo {
    kind: ResourceKind::Warehouses,
    name: "warehouses",
    aliases: &["w", "warehouse"],
    path: "/warehouses",
    label: "Warehouse",
  },
  KindInfo {
    kind: ResourceKind::Requests,
    name: "requests",
    aliases: &["r", "request"],
    path: "/requests",
    label: "Request",
  },
  KindInfo {
    kind: ResourceKind::Approvals,
    name: "approvals",
    aliases: &["approval"],
    path: "/approvals",
    label: "Approval",
  },
  KindInfo {
    kind: ResourceKind::Departments,
    name: "departments",
    aliases: &["d", "department", "depts"],
    path: "/departments",
    label: "Department",
  },
  KindInfo {
    kind: ResourceKind::Roles,
    name: "roles",
    aliases: &["role"],
    path: "/roles",
    label: "Role",
  },
  KindInfo {
    kind: ResourceKind::Notifications,
    name: "notifications",
    aliases: &["n", "notification"],
    path: "/notifications",
    label: "Notification",
  },
  KindInfo {
    kind: ResourceKind::Kpis,
    name: "kpis",
    aliases: &["kpi"],
    path: "/kpis",
    label: "KPI",
  },
  KindInfo {
    kind: ResourceKind::Tags,
    name: "tags",
    aliases: &["tag"],
    path: "/tags",
    label: "Tag",
  },
  KindInfo {
    kind: ResourceKind::Users,
    name: "users",
    aliases: &["u", "user"],
    path: "/users",
    label: "User",
  },
  KindInfo {
    kind: ResourceKind::Dispatches,
    name: "dispatches",
    aliases: &["dispatch"],
    path: "/dispatches",
    label: "Dispatch",
  },
  KindInfo {
    kind: ResourceKind::Issues,
    name: "issues",
    aliases: &["i", "issue"],
    path: "/issues",
    label: "Issue",
  },
  KindInfo {
    kind: ResourceKind::StoreRequisitions,
    name: "store-requisitions",
    aliases: &["requisitions", "srq"],
    path: "/store-requisitions",
    label: "Store requisition",
  },
  KindInfo {
    kind: ResourceKind::RequestDeliveries,
    name: "request-deliveries",
    aliases: &["deliveries"],
    path: "/request-deliveries",
    label: "Request delivery",
  },
  KindInfo {
    kind: ResourceKind::WorkflowLogs,
    name: "workflow-logs",
    aliases: &["workflow", "logs"],
    path: "/workflow-logs",
    label: "Workflow log",
  },
  KindInfo {
    kind: ResourceKind::Budgets,
    name: "budgets",
    aliases: &["budget"],
    path: "/budgets",
    label: "Budget",
  },
  KindInfo {
    kind: ResourceKind::Invoices,
    name: "invoices",
    aliases: &["invoice"],
    path: "/invoices",
    label: "Invoice",
  },
  KindInfo {
    kind: ResourceKind::Payrolls,
    name: "payrolls",
    aliases: &["payroll"],
    path: "/payrolls",
    label: "Payroll",
  },
];

// KINDS is indexed by discriminant: one entry per variant, in declaration order.
const _: () = {
  assert!(KINDS.len() == ResourceKind::Payrolls as usize + 1);
  let mut i = 0;
  while i < KINDS.len() {
    assert!(KINDS[i].kind as usize == i);
    i += 1;
  }
};

impl ResourceKind {
  pub fn info(self) -> &'static KindInfo {
    &KINDS[self as usize]
  }

  pub fn name(self) -> &'static str {
    self.info().name
  }

  pub fn path(self) -> &'static str {
    self.info().path
  }

  pub fn label(self) -> &'static str {
    self.info().label
  }

  /// Name of the durable blob holding this resource's store.
  pub fn store_name(self) -> String {
    format!("{}-storage", self.name())
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Ranked matches for a (possibly partial) resource name.
pub fn get_suggestions(input: &str) -> Vec<&'static KindInfo> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return KINDS.iter().collect();
  }

  let mut matches: Vec<(&KindInfo, u32)> = Vec::new();

  for info in KINDS {
    if info.name == input_lower {
      matches.push((info, 0));
    } else if info.aliases.contains(&input_lower.as_str()) {
      matches.push((info, 1));
    } else if info.name.starts_with(&input_lower) {
      matches.push((info, 2));
    } else if info.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((info, 3));
    } else if info.name.contains(&input_lower) {
      matches.push((info, 4));
    } else if info.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((info, 5));
    }
  }

  // Stable sort keeps table order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(info, _)| info).collect()
}

/// Best match for `input`, if any.
pub fn resolve(input: &str) -> Option<ResourceKind> {
  if input.trim().is_empty() {
    return None;
  }
  get_suggestions(input).first().map(|info| info.kind)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_kind_has_info() {
    for info in KINDS {
      assert_eq!(info.kind.info().name, info.name);
      assert!(info.path.starts_with('/'));
    }
  }

  #[test]
  fn test_info_matches_kind() {
    let all = [
      ResourceKind::Projects,
      ResourceKind::Tasks,
      ResourceKind::Materials,
      ResourceKind::StoreRequisitions,
      ResourceKind::Payrolls,
    ];
    for kind in all {
      assert_eq!(kind.info().kind, kind);
    }
    assert_eq!(ResourceKind::Payrolls.path(), "/payrolls");
    assert_eq!(ResourceKind::Users.label(), "User");
  }

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), KINDS.len());
    assert_eq!(resolve("  "), None);
  }

  #[test]
  fn test_exact_match() {
    assert_eq!(resolve("projects"), Some(ResourceKind::Projects));
    assert_eq!(resolve("Labor"), Some(ResourceKind::Labor));
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(resolve("t"), Some(ResourceKind::Tasks));
    assert_eq!(resolve("payroll"), Some(ResourceKind::Payrolls));
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(resolve("ware"), Some(ResourceKind::Warehouses));
  }

  #[test]
  fn test_fuzzy_match() {
    assert_eq!(resolve("requisition"), Some(ResourceKind::StoreRequisitions));
  }

  #[test]
  fn test_no_match() {
    assert_eq!(resolve("xyzzy"), None);
  }

  #[test]
  fn test_store_names() {
    assert_eq!(ResourceKind::Projects.store_name(), "projects-storage");
    assert_eq!(
      ResourceKind::WorkflowLogs.store_name(),
      "workflow-logs-storage"
    );
  }
}
