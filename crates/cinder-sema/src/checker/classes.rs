// checker/classes.rs
//
// Class instantiation: ancestor, chain id, field layout, method signatures,
// vtable slots, initializer and protocol conformance.

use cinder_frontend::ast::{ClassDecl, FuncDecl};
use cinder_identity::{ClassInstId, FileId, FuncInstId, NamespaceId, Span, StructureId};

use super::type_resolution::bind;
use super::{Checker, FunctionEnv, MAX_INSTANTIATION_DEPTH, Substitution};
use crate::checked::{CheckedBlock, CheckedClass, CheckedField, CheckedFunction, MethodEntry};
use crate::errors::SemanticError;
use crate::scope_tree::{FunctionKind, StructureDecl};
use crate::specialization::ClassKey;
use crate::types::Type;

/// A class instance whose construction continues once its ancestor is done.
/// A base class naming its own subclass in a signature reaches the subclass
/// while the base is still being built.
pub(super) struct PendingClass {
    id: ClassInstId,
    key: ClassKey,
    structure: StructureId,
    decl: std::rc::Rc<ClassDecl>,
    subst: Substitution,
    namespace: NamespaceId,
    file: FileId,
    depth: u32,
}

enum AncestorState {
    Ready(Option<ClassInstId>),
    Waiting(ClassInstId),
}

impl Checker<'_> {
    pub(super) fn check_class_inner(
        &mut self,
        structure: StructureId,
        type_args: &[Type],
        span: Span,
    ) -> Option<ClassInstId> {
        let key = ClassKey {
            structure,
            type_args: type_args.to_vec(),
        };
        if let Some(entry) = self.program.cache.classes.lookup(&key) {
            return Some(entry.id());
        }
        let symbol = self.tree.structure(structure);
        let (namespace, file) = (symbol.namespace, symbol.file);
        let decl = symbol.as_class()?.clone();

        if type_args.len() != decl.type_params.len() {
            self.add_error(
                SemanticError::WrongNumberOfTypeArguments {
                    expected: decl.type_params.len(),
                    found: type_args.len(),
                    span: span.into(),
                },
                span,
            );
            return None;
        }
        let generic = !type_args.is_empty();
        let outer_depth = self.depth;
        if generic {
            if self.depth >= MAX_INSTANTIATION_DEPTH {
                self.add_error(
                    SemanticError::InstantiationTooDeep {
                        name: self.tree.structure_path(structure, self.interner),
                        limit: MAX_INSTANTIATION_DEPTH,
                        span: span.into(),
                    },
                    span,
                );
                return None;
            }
            self.depth += 1;
        }

        let id = ClassInstId::new(self.program.classes.len() as u32);
        let mut subst = Substitution::default();
        bind(&decl.type_params, type_args, &mut subst);
        let display_name = self.class_display_name(structure, type_args);
        tracing::debug!(class = %display_name, instance = id.index(), "checking class");

        self.program.classes.push(CheckedClass {
            id: 0,
            root: id,
            next_id: 1,
            structure,
            name: decl.name,
            display_name,
            type_args: type_args.to_vec(),
            ancestor: None,
            fields: Vec::new(),
            methods: Default::default(),
            virtual_methods: Vec::new(),
            slot_owners: Vec::new(),
            vtable: Vec::new(),
            init: None,
            protocols: Vec::new(),
            in_progress: true,
            span: decl.span,
        });
        self.class_envs.insert(id, subst.clone());
        self.program.cache.classes.begin(key.clone(), id);

        let pending = PendingClass {
            id,
            key,
            structure,
            decl,
            subst,
            namespace,
            file,
            depth: self.depth,
        };
        match self.resolve_ancestor(&pending) {
            AncestorState::Ready(ancestor) => self.complete_class(pending, ancestor),
            AncestorState::Waiting(base) => {
                tracing::debug!(instance = id.index(), ancestor = base.index(), "waiting for ancestor");
                self.waiting_on.entry(base).or_default().push(pending);
            }
        }
        self.depth = outer_depth;
        Some(id)
    }

    /// Everything after the ancestor: layout, methods, initializer,
    /// conformance and the flat vtable. Descendants waiting on this class
    /// are completed right after it.
    fn complete_class(&mut self, class: PendingClass, ancestor: Option<ClassInstId>) {
        let PendingClass {
            id,
            key,
            structure,
            decl,
            subst,
            namespace,
            file,
            depth,
        } = class;
        let outer_depth = std::mem::replace(&mut self.depth, depth);

        self.check_class_layout(id, &decl, &subst, ancestor);
        self.check_class_methods(id, structure, &decl);
        self.check_class_init(id, structure, namespace, file);
        self.check_conformance(id, structure, &decl, &subst);

        let vtable: Vec<FuncInstId> = self
            .program
            .class(id)
            .slot_owners
            .iter()
            .map(|&base| self.program.resolve_override(base, id))
            .collect();
        let class = &mut self.program.classes[id.as_usize()];
        class.vtable = vtable;
        class.in_progress = false;
        self.program.cache.classes.finish(key, id);
        self.depth = outer_depth;

        for descendant in self.waiting_on.remove(&id).unwrap_or_default() {
            self.complete_class(descendant, Some(id));
        }
    }

    /// Classes still waiting once the outermost request returns have an
    /// ancestor that never completed. They are finished as roots.
    pub(super) fn complete_orphans(&mut self) {
        while !self.waiting_on.is_empty() {
            for (base, class) in std::mem::take(&mut self.waiting_on)
                .into_iter()
                .flat_map(|(base, waiting)| waiting.into_iter().map(move |class| (base, class)))
            {
                if let Some(te) = &class.decl.ancestor {
                    self.add_error(
                        SemanticError::UnableToInherit {
                            name: self.display(Type::Class(base)),
                            reason: "ancestor never completed".to_string(),
                            span: te.span.into(),
                        },
                        te.span,
                    );
                }
                self.complete_class(class, None);
            }
        }
    }

    fn class_display_name(&self, structure: StructureId, type_args: &[Type]) -> String {
        let name = self.name(self.tree.structure(structure).name);
        if type_args.is_empty() {
            return name;
        }
        let args: Vec<String> = type_args.iter().map(|&t| self.display(t)).collect();
        format!("{name}<{}>", args.join(", "))
    }

    /// Ancestor, chain id and the flattened field list.
    fn check_class_layout(
        &mut self,
        id: ClassInstId,
        decl: &ClassDecl,
        subst: &Substitution,
        ancestor: Option<ClassInstId>,
    ) {
        let (root, chain_id, mut fields, slot_owners) = match ancestor {
            Some(base) => {
                let root = self.program.class(base).root;
                let root_class = &mut self.program.classes[root.as_usize()];
                let chain_id = root_class.next_id;
                root_class.next_id += 1;
                let base = self.program.class(base);
                (root, chain_id, base.fields.clone(), base.slot_owners.clone())
            }
            None => (id, 0, Vec::new(), Vec::new()),
        };

        for field in &decl.fields {
            let ty = self.resolve_type(&field.ty, subst);
            if fields.iter().any(|f| f.name == field.name) {
                self.add_error(
                    SemanticError::SymbolAlreadyExists {
                        name: self.name(field.name),
                        span: field.span.into(),
                    },
                    field.span,
                );
                continue;
            }
            fields.push(CheckedField {
                name: field.name,
                ty,
                index: fields.len(),
                declared_in: id,
                span: field.span,
            });
        }

        let class = &mut self.program.classes[id.as_usize()];
        class.id = chain_id;
        class.root = root;
        class.ancestor = ancestor;
        class.fields = fields;
        class.slot_owners = slot_owners;
    }

    /// A cycle is an ancestor whose own ancestor resolution is still on the
    /// stack. An ancestor that is merely still being built is waited for.
    fn resolve_ancestor(&mut self, class: &PendingClass) -> AncestorState {
        let Some(te) = &class.decl.ancestor else {
            return AncestorState::Ready(None);
        };
        self.resolving_ancestors.push(class.id);
        let ty = self.resolve_type(te, &class.subst);
        self.resolving_ancestors.pop();

        let reason = match ty {
            Type::Unknown => return AncestorState::Ready(None),
            Type::Class(base) if !self.program.class(base).in_progress => return AncestorState::Ready(Some(base)),
            Type::Class(base) if base != class.id && !self.resolving_ancestors.contains(&base) => {
                return AncestorState::Waiting(base);
            }
            Type::Class(_) => "inheritance cycle",
            _ => "only classes can be inherited",
        };
        self.add_error(
            SemanticError::UnableToInherit {
                name: self.display(ty),
                reason: reason.to_string(),
                span: te.span.into(),
            },
            te.span,
        );
        AncestorState::Ready(None)
    }

    /// Signatures of the class's own methods plus their dispatch rules.
    /// Generic methods are instantiated per call.
    fn check_class_methods(&mut self, id: ClassInstId, structure: StructureId, decl: &ClassDecl) {
        for method in &decl.methods {
            let Some(&symbol) = self.tree.structure(structure).methods.get(&method.name) else {
                continue;
            };
            if self.tree.function(symbol).decl.id != method.id {
                // Duplicate name, reported when the scope tree was built
                continue;
            }
            let entry = if method.type_params.is_empty() {
                let receiver = Some(Type::Class(id));
                let Some(function) = self.check_function_inner(symbol, &[], receiver, method.span) else {
                    continue;
                };
                self.apply_dispatch_rules(id, function, method);
                MethodEntry::Instance(function)
            } else {
                MethodEntry::Generic(symbol)
            };
            self.program.classes[id.as_usize()]
                .methods
                .insert(method.name, entry);
        }
    }

    fn apply_dispatch_rules(&mut self, id: ClassInstId, function: FuncInstId, method: &FuncDecl) {
        let (name, span, modifiers) = (method.name, method.span, method.modifiers);
        let base = self
            .program
            .class(id)
            .ancestor
            .and_then(|ancestor| self.program.find_method(ancestor, name));

        match base {
            Some((_, MethodEntry::Instance(base_fn))) if self.program.function(base_fn).is_dispatched() => {
                if !modifiers.is_override {
                    self.add_error(
                        SemanticError::ExpectedOverride {
                            name: self.name(name),
                            span: span.into(),
                        },
                        span,
                    );
                }
                self.check_override_signature(base_fn, function, span);
                let Some(slot) = self.program.function(base_fn).vtable_slot else {
                    return;
                };
                let class = self.program.class(id);
                let (chain_id, owner) = (class.id, class.slot_owners[slot as usize]);
                let f = &mut self.program.functions[function.as_usize()];
                f.is_override = true;
                f.vtable_slot = Some(slot);
                if let Err(err) = self.program.functions[owner.as_usize()].register_override(chain_id, function) {
                    self.internal_error(err.to_string(), span);
                }
            }
            Some(_) => self.add_error(
                SemanticError::CannotOverrideNonVirtual {
                    name: self.name(name),
                    span: span.into(),
                },
                span,
            ),
            None => {
                if modifiers.is_override {
                    self.add_error(
                        SemanticError::NoMethodToOverride {
                            name: self.name(name),
                            span: span.into(),
                        },
                        span,
                    );
                }
                if modifiers.is_virtual {
                    self.open_slot(id, function);
                }
            }
        }
    }

    /// A virtual method takes the next free slot and registers itself.
    fn open_slot(&mut self, id: ClassInstId, function: FuncInstId) {
        let class = &mut self.program.classes[id.as_usize()];
        let slot = class.slot_owners.len() as u32;
        let chain_id = class.id;
        class.slot_owners.push(function);
        class.virtual_methods.push(function);

        let f = &mut self.program.functions[function.as_usize()];
        f.is_virtual = true;
        f.vtable_slot = Some(slot);
        f.overrides.insert(chain_id, function);
    }

    /// Overrides must keep the base signature so every slot has one ABI.
    fn check_override_signature(&mut self, base: FuncInstId, function: FuncInstId, span: Span) {
        let base_fn = self.program.function(base);
        let f = self.program.function(function);
        let (expected, found) = (base_fn.params.len(), f.params.len());
        if expected != found {
            self.wrong_arity(expected, found, span);
            return;
        }
        let pairs: Vec<(Type, Type)> = base_fn
            .params
            .iter()
            .zip(&f.params)
            .map(|(b, o)| (b.ty, o.ty))
            .chain(std::iter::once((base_fn.return_type, f.return_type)))
            .collect();
        for (expected, found) in pairs {
            if expected != found {
                self.type_mismatch(expected, found, span);
            }
        }
    }

    /// User initializer, or one synthesized to run the field defaults.
    fn check_class_init(&mut self, id: ClassInstId, structure: StructureId, namespace: NamespaceId, file: FileId) {
        let init = match self.tree.structure(structure).init {
            Some(symbol) => {
                let span = self.tree.function(symbol).decl.span;
                self.check_function_inner(symbol, &[], Some(Type::Class(id)), span)
            }
            None => Some(self.synthesize_init(id, namespace, file)),
        };
        self.program.classes[id.as_usize()].init = init;
    }

    fn synthesize_init(&mut self, id: ClassInstId, namespace: NamespaceId, file: FileId) -> FuncInstId {
        let function = FuncInstId::new(self.program.functions.len() as u32);
        let class = self.program.class(id);
        let (name, span) = (class.name, class.span);
        let link_name = format!("{}.init${}", class.display_name, function.index());
        self.program.functions.push(CheckedFunction {
            symbol: None,
            name,
            link_name,
            kind: FunctionKind::Init,
            type_args: Vec::new(),
            receiver: Some(Type::Class(id)),
            params: Vec::new(),
            locals: Vec::new(),
            field_inits: Vec::new(),
            body: Some(CheckedBlock {
                stmts: Vec::new(),
                tail: None,
                ty: Type::VOID,
                diverges: false,
                span,
            }),
            return_type: Type::VOID,
            is_virtual: false,
            is_override: false,
            owner: Some(id),
            vtable_slot: None,
            overrides: Default::default(),
            exported: false,
            span,
        });
        self.function_envs.insert(
            function,
            FunctionEnv {
                subst: self.class_envs.get(&id).cloned().unwrap_or_default(),
                namespace,
                file,
                class: Some(id),
                self_type: Some(Type::Class(id)),
                depth: self.depth,
            },
        );
        self.pending_bodies.push_back(function);
        function
    }

    /// Conformance is by method name and arity across the class chain.
    fn check_conformance(&mut self, id: ClassInstId, structure: StructureId, decl: &ClassDecl, subst: &Substitution) {
        for te in &decl.protocols {
            let protocol = match self.resolve_type(te, subst) {
                Type::Protocol(protocol) => protocol,
                Type::Unknown => continue,
                other => {
                    self.type_error("a protocol", other, te.span);
                    continue;
                }
            };
            let StructureDecl::Protocol(protocol_decl) = &self.tree.structure(protocol).decl else {
                continue;
            };
            let protocol_decl = protocol_decl.clone();
            let mut satisfied = true;
            for required in &protocol_decl.methods {
                let arity = self
                    .program
                    .find_method(id, required.name)
                    .map(|(_, entry)| self.method_arity(entry));
                if arity != Some(required.params.len()) {
                    satisfied = false;
                    self.add_error(
                        SemanticError::ProtocolNotSatisfied {
                            class: self.program.class(id).display_name.clone(),
                            protocol: self.tree.structure_path(protocol, self.interner),
                            method: self.name(required.name),
                            span: te.span.into(),
                        },
                        te.span,
                    );
                }
            }
            if !satisfied {
                continue;
            }
            self.program.classes[id.as_usize()].protocols.push(protocol);
            let implementors = &mut self.tree.structure_mut(protocol).implementors;
            if !implementors.contains(&structure) {
                implementors.push(structure);
            }
        }
    }

    fn method_arity(&self, entry: MethodEntry) -> usize {
        match entry {
            MethodEntry::Instance(function) => self.program.function(function).params.len(),
            MethodEntry::Generic(symbol) => self.tree.function(symbol).decl.params.len(),
        }
    }

    /// Protocol requirements only need their signature types to resolve.
    pub(super) fn check_protocol(&mut self, protocol: StructureId) {
        let StructureDecl::Protocol(decl) = &self.tree.structure(protocol).decl else {
            return;
        };
        if !decl.type_params.is_empty() {
            return;
        }
        let decl = decl.clone();
        let subst = Substitution::default();
        for method in &decl.methods {
            for param in &method.params {
                self.resolve_type(&param.ty, &subst);
            }
            if let Some(ret) = &method.return_type {
                self.resolve_type(ret, &subst);
            }
        }
    }
}
