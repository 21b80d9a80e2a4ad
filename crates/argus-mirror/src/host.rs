//! In-process mirror backed by a class registry and an object heap.
//!
//! Hosts describe each class once with [`ClassDef`] (member bodies are native
//! closures) and the mirror takes over storage: instance fields, static
//! slots, per-member accessibility, and out-of-band attachments. Loaders form
//! a parent-delegating tree rooted at [`BOOTSTRAP_LOADER`], which is seeded
//! with the core classes the boxed-wrapper rules depend on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::access::{self, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC};
use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, DescriptorError, FieldType, MethodDescriptor,
    ReturnType,
};
use crate::mirror::{FieldInfo, MemberId, MethodInfo, Mirror, MirrorError, Thrown};
use crate::value::Value;
use crate::{binary_name, ClassId, FieldId, LoaderId, MethodId, ObjectId, BOOTSTRAP_LOADER};

/// A method or constructor body.
///
/// `receiver` is `Some` for instance dispatch and constructors, `None` for
/// statics. Bodies run with no mirror lock held and may re-enter the host
/// freely; a raised [`Thrown`] propagates to the caller unchanged.
pub type NativeBody =
    Arc<dyn Fn(&HostMirror, Option<ObjectId>, &[Value]) -> Result<Value, Thrown> + Send + Sync>;

/// A class shape to register, members in declaration order.
///
/// Declaration order is observable: resolution over this mirror picks the
/// first applicable overload, so the order of `methods` and `constructors`
/// matters to callers the same way class-file order does.
pub struct ClassDef {
    pub name: String,
    pub loader: LoaderId,
    pub access_flags: u16,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub fields: Vec<FieldDef>,
    pub constructors: Vec<ConstructorDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, loader: LoaderId, access_flags: u16) -> Self {
        ClassDef {
            name: name.into(),
            loader,
            access_flags,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: ClassId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: ClassId) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.constructors.push(ctor);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }
}

pub struct FieldDef {
    pub name: String,
    /// JVM field descriptor (`I`, `Ljava/lang/String;`, ...).
    pub descriptor: String,
    pub access_flags: u16,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access_flags: u16) -> Self {
        FieldDef {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
        }
    }
}

pub struct MethodDef {
    pub name: String,
    /// JVM method descriptor (`(ILjava/lang/String;)V`, ...).
    pub descriptor: String,
    pub access_flags: u16,
    pub body: NativeBody,
}

impl MethodDef {
    pub fn new(
        name: impl Into<String>,
        descriptor: impl Into<String>,
        access_flags: u16,
        body: impl Fn(&HostMirror, Option<ObjectId>, &[Value]) -> Result<Value, Thrown>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        MethodDef {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
            body: Arc::new(body),
        }
    }
}

pub struct ConstructorDef {
    /// JVM method descriptor; must return `V`.
    pub descriptor: String,
    pub access_flags: u16,
    pub body: NativeBody,
}

impl ConstructorDef {
    pub fn new(
        descriptor: impl Into<String>,
        access_flags: u16,
        body: impl Fn(&HostMirror, Option<ObjectId>, &[Value]) -> Result<Value, Thrown>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        ConstructorDef {
            descriptor: descriptor.into(),
            access_flags,
            body: Arc::new(body),
        }
    }
}

struct ClassEntry {
    name: String,
    loader: LoaderId,
    access_flags: u16,
    superclass: Option<ClassId>,
    interfaces: Vec<ClassId>,
    fields: Vec<FieldId>,
    methods: Vec<MethodId>,
    constructors: Vec<MethodId>,
}

struct FieldEntry {
    declaring: ClassId,
    name: String,
    descriptor: FieldType,
    access_flags: u16,
    accessible: AtomicBool,
}

struct MethodEntry {
    declaring: ClassId,
    name: String,
    descriptor: MethodDescriptor,
    access_flags: u16,
    accessible: AtomicBool,
    body: NativeBody,
}

struct ObjectEntry {
    class: ClassId,
    fields: HashMap<FieldId, Value>,
    attachments: HashMap<String, Value>,
}

#[derive(Default)]
struct Tables {
    /// Loader id to parent; the bootstrap loader has no parent.
    loaders: HashMap<LoaderId, Option<LoaderId>>,
    classes_by_name: HashMap<(LoaderId, String), ClassId>,
    classes: HashMap<ClassId, ClassEntry>,
    fields: HashMap<FieldId, FieldEntry>,
    methods: HashMap<MethodId, MethodEntry>,
    statics: HashMap<FieldId, Value>,
    objects: HashMap<ObjectId, ObjectEntry>,
}

impl Tables {
    fn class(&self, id: ClassId) -> Result<&ClassEntry, MirrorError> {
        self.classes.get(&id).ok_or(MirrorError::UnknownClass(id))
    }

    fn field(&self, id: FieldId) -> Result<&FieldEntry, MirrorError> {
        self.fields.get(&id).ok_or(MirrorError::UnknownField(id))
    }

    fn method(&self, id: MethodId) -> Result<&MethodEntry, MirrorError> {
        self.methods.get(&id).ok_or(MirrorError::UnknownMethod(id))
    }

    fn object(&self, id: ObjectId) -> Result<&ObjectEntry, MirrorError> {
        self.objects.get(&id).ok_or(MirrorError::UnknownObject(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectEntry, MirrorError> {
        self.objects
            .get_mut(&id)
            .ok_or(MirrorError::UnknownObject(id))
    }

    fn class_display(&self, id: ClassId) -> String {
        match self.classes.get(&id) {
            Some(entry) => entry.name.clone(),
            None => format!("#{id}"),
        }
    }

    fn member_display(&self, declaring: ClassId, name: &str) -> String {
        format!("{}#{name}", self.class_display(declaring))
    }

    /// Is `class` the same as `ancestor` or below it on the superclass chain?
    fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> Result<bool, MirrorError> {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.class(id)?.superclass;
        }
        Ok(false)
    }

    /// Name-based assignability over superclass and superinterface edges.
    /// The in-table twin of [`crate::assignable`], usable while a lock is
    /// held.
    fn assignable_to_name(&self, from: ClassId, target: &str) -> Result<bool, MirrorError> {
        let mut queue = vec![from];
        let mut seen = vec![from];
        while let Some(id) = queue.pop() {
            let entry = self.class(id)?;
            if entry.name == target {
                return Ok(true);
            }
            let edges = entry.superclass.iter().chain(entry.interfaces.iter());
            for &next in edges {
                if !seen.contains(&next) {
                    seen.push(next);
                    queue.push(next);
                }
            }
        }
        Ok(false)
    }

    /// Access model: overridden members are always reachable; otherwise both
    /// the member and its declaring class must be public.
    fn check_field_access(&self, field: &FieldEntry) -> Result<(), MirrorError> {
        if field.accessible.load(Ordering::Acquire) {
            return Ok(());
        }
        let declaring = self.class(field.declaring)?;
        if access::is_public(field.access_flags) && access::is_public(declaring.access_flags) {
            return Ok(());
        }
        Err(MirrorError::AccessDenied {
            member: self.member_display(field.declaring, &field.name),
        })
    }

    fn check_method_access(&self, method: &MethodEntry) -> Result<(), MirrorError> {
        if method.accessible.load(Ordering::Acquire) {
            return Ok(());
        }
        let declaring = self.class(method.declaring)?;
        if access::is_public(method.access_flags) && access::is_public(declaring.access_flags) {
            return Ok(());
        }
        Err(MirrorError::AccessDenied {
            member: self.member_display(method.declaring, &method.name),
        })
    }

    /// Storage-level compatibility: the only type check a field write gets.
    fn check_store(&self, field: &FieldEntry, value: &Value) -> Result<(), MirrorError> {
        let compatible = match &field.descriptor {
            FieldType::Base(base) => value.base_type() == Some(*base),
            FieldType::Object(_) | FieldType::Array(_) => match value {
                Value::Null => true,
                Value::Void => false,
                Value::Object(id) => {
                    let class = self.object(*id)?.class;
                    self.assignable_to_name(class, &field.descriptor.binary_name())?
                }
                // An unboxed primitive lands in a reference slot through its
                // wrapper class, same as overload matching sees it.
                primitive => match primitive.wrapper_class_name() {
                    Some(wrapper) => {
                        let class = self
                            .classes_by_name
                            .get(&(BOOTSTRAP_LOADER, wrapper.to_string()))
                            .copied();
                        match class {
                            Some(class) => {
                                self.assignable_to_name(class, &field.descriptor.binary_name())?
                            }
                            None => false,
                        }
                    }
                    None => false,
                },
            },
        };
        if compatible {
            Ok(())
        } else {
            Err(MirrorError::IncompatibleValue {
                target: self.member_display(field.declaring, &field.name),
                expected: field.descriptor.binary_name(),
                got: value.kind_name(),
            })
        }
    }

    /// Instance fields declared anywhere on the chain from `class` to the
    /// root, for default initialization of a fresh allocation.
    fn instance_field_defaults(
        &self,
        class: ClassId,
    ) -> Result<HashMap<FieldId, Value>, MirrorError> {
        let mut defaults = HashMap::new();
        let mut current = Some(class);
        while let Some(id) = current {
            let entry = self.class(id)?;
            for &field_id in &entry.fields {
                let field = self.field(field_id)?;
                if !access::is_static(field.access_flags) {
                    defaults.insert(field_id, Value::default_for(&field.descriptor));
                }
            }
            current = entry.superclass;
        }
        Ok(defaults)
    }
}

/// The in-process [`Mirror`] implementation.
///
/// All operations are synchronous and run on the caller's thread. Internal
/// tables sit behind an `RwLock` held only across metadata and storage
/// access, never across a native body, so bodies can re-enter the host.
/// Static field reads and writes are individually consistent but carry no
/// cross-call atomicity; callers needing read-modify-write consistency
/// synchronize externally.
pub struct HostMirror {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl HostMirror {
    pub fn new() -> Self {
        let host = HostMirror {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
        };
        host.write().loaders.insert(BOOTSTRAP_LOADER, None);
        host.seed_core_classes();
        host
    }

    fn mint(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // Lock poisoning only happens on a panic while holding the guard;
        // the tables are never left half-written, so keep going.
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The classes the boxed-wrapper rules rely on: `Object`, the marker
    /// interfaces, `Number`, and the eight wrappers with faithful supertype
    /// edges, all in the bootstrap loader.
    fn seed_core_classes(&self) {
        const PUBLIC_IFACE: u16 = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;

        let seed = |def: ClassDef| -> ClassId {
            self.register_class(def)
                .unwrap_or_else(|err| panic!("core class table is well-formed: {err}"))
        };

        let object = seed(ClassDef::new("java.lang.Object", BOOTSTRAP_LOADER, ACC_PUBLIC));
        let serializable = seed(ClassDef::new(
            "java.io.Serializable",
            BOOTSTRAP_LOADER,
            PUBLIC_IFACE,
        ));
        let comparable = seed(ClassDef::new(
            "java.lang.Comparable",
            BOOTSTRAP_LOADER,
            PUBLIC_IFACE,
        ));
        let number = seed(
            ClassDef::new(
                "java.lang.Number",
                BOOTSTRAP_LOADER,
                ACC_PUBLIC | ACC_ABSTRACT,
            )
            .extends(object)
            .implements(serializable),
        );
        for name in ["java.lang.Byte", "java.lang.Short", "java.lang.Integer",
            "java.lang.Long", "java.lang.Float", "java.lang.Double"]
        {
            seed(
                ClassDef::new(name, BOOTSTRAP_LOADER, ACC_PUBLIC | ACC_FINAL)
                    .extends(number)
                    .implements(comparable),
            );
        }
        for name in ["java.lang.Boolean", "java.lang.Character"] {
            seed(
                ClassDef::new(name, BOOTSTRAP_LOADER, ACC_PUBLIC | ACC_FINAL)
                    .extends(object)
                    .implements(serializable)
                    .implements(comparable),
            );
        }
    }

    /// Adds a loader delegating to `parent`.
    pub fn register_loader(&self, parent: LoaderId) -> Result<LoaderId, MirrorError> {
        let mut tables = self.write();
        if !tables.loaders.contains_key(&parent) {
            return Err(MirrorError::UnknownLoader(parent));
        }
        let id = self.mint();
        tables.loaders.insert(id, Some(parent));
        Ok(id)
    }

    /// Registers a class shape, validating handles, descriptors, and
    /// uniqueness before anything is stored.
    pub fn register_class(&self, def: ClassDef) -> Result<ClassId, MirrorError> {
        let name = binary_name(&def.name);
        let mut tables = self.write();
        if !tables.loaders.contains_key(&def.loader) {
            return Err(MirrorError::UnknownLoader(def.loader));
        }
        if tables.classes_by_name.contains_key(&(def.loader, name.clone())) {
            return Err(MirrorError::DuplicateClass(name));
        }
        if let Some(superclass) = def.superclass {
            tables.class(superclass)?;
        }
        for &interface in &def.interfaces {
            tables.class(interface)?;
        }

        let mut field_types = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            if def.fields.iter().filter(|f| f.name == field.name).count() > 1 {
                return Err(MirrorError::DuplicateMember {
                    class: name,
                    member: field.name.clone(),
                });
            }
            field_types.push(parse_field_descriptor(&field.descriptor)?);
        }
        let mut method_types = Vec::with_capacity(def.methods.len());
        for method in &def.methods {
            let duplicates = def
                .methods
                .iter()
                .filter(|m| m.name == method.name && m.descriptor == method.descriptor)
                .count();
            if duplicates > 1 {
                return Err(MirrorError::DuplicateMember {
                    class: name,
                    member: format!("{}{}", method.name, method.descriptor),
                });
            }
            method_types.push(parse_method_descriptor(&method.descriptor)?);
        }
        let mut ctor_types = Vec::with_capacity(def.constructors.len());
        for ctor in &def.constructors {
            let parsed = parse_method_descriptor(&ctor.descriptor)?;
            if parsed.return_type != ReturnType::Void {
                return Err(DescriptorError(ctor.descriptor.clone()).into());
            }
            if def
                .constructors
                .iter()
                .filter(|c| c.descriptor == ctor.descriptor)
                .count()
                > 1
            {
                return Err(MirrorError::DuplicateMember {
                    class: name,
                    member: format!("<init>{}", ctor.descriptor),
                });
            }
            ctor_types.push(parsed);
        }

        let class_id = self.mint();
        let mut entry = ClassEntry {
            name: name.clone(),
            loader: def.loader,
            access_flags: def.access_flags,
            superclass: def.superclass,
            interfaces: def.interfaces,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        };
        for (field, descriptor) in def.fields.into_iter().zip(field_types) {
            let id = self.mint();
            if access::is_static(field.access_flags) {
                tables.statics.insert(id, Value::default_for(&descriptor));
            }
            tables.fields.insert(
                id,
                FieldEntry {
                    declaring: class_id,
                    name: field.name,
                    descriptor,
                    access_flags: field.access_flags,
                    accessible: AtomicBool::new(false),
                },
            );
            entry.fields.push(id);
        }
        for (method, descriptor) in def.methods.into_iter().zip(method_types) {
            let id = self.mint();
            tables.methods.insert(
                id,
                MethodEntry {
                    declaring: class_id,
                    name: method.name,
                    descriptor,
                    access_flags: method.access_flags,
                    accessible: AtomicBool::new(false),
                    body: method.body,
                },
            );
            entry.methods.push(id);
        }
        for (ctor, descriptor) in def.constructors.into_iter().zip(ctor_types) {
            let id = self.mint();
            tables.methods.insert(
                id,
                MethodEntry {
                    declaring: class_id,
                    name: "<init>".to_string(),
                    descriptor,
                    access_flags: ctor.access_flags,
                    accessible: AtomicBool::new(false),
                    body: ctor.body,
                },
            );
            entry.constructors.push(id);
        }
        tables.classes.insert(class_id, entry);
        tables
            .classes_by_name
            .insert((def.loader, name.clone()), class_id);
        debug!(class = %name, loader = def.loader, id = class_id, "registered class");
        Ok(class_id)
    }

    /// Frees an instance; later access through its id fails
    /// [`MirrorError::UnknownObject`]. Attachments die with it.
    pub fn collect_object(&self, object: ObjectId) -> Result<(), MirrorError> {
        let mut tables = self.write();
        tables
            .objects
            .remove(&object)
            .ok_or(MirrorError::UnknownObject(object))?;
        trace!(object, "collected object");
        Ok(())
    }

    /// Attaches a value to a live object under `key`, outside its declared
    /// fields. Overwrites any previous value for the key.
    pub fn set_attachment(
        &self,
        object: ObjectId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), MirrorError> {
        let mut tables = self.write();
        tables.object_mut(object)?.attachments.insert(key.into(), value);
        Ok(())
    }

    /// Reads an attachment; `None` when the key was never set.
    pub fn attachment(&self, object: ObjectId, key: &str) -> Result<Option<Value>, MirrorError> {
        let tables = self.read();
        Ok(tables.object(object)?.attachments.get(key).cloned())
    }

    /// Removes and returns an attachment.
    pub fn take_attachment(
        &self,
        object: ObjectId,
        key: &str,
    ) -> Result<Option<Value>, MirrorError> {
        let mut tables = self.write();
        Ok(tables.object_mut(object)?.attachments.remove(key))
    }

    /// Resolves a method body and the facts needed to dispatch it, without
    /// keeping the lock across the body call.
    fn prepare_invoke(
        &self,
        method: MethodId,
        args: &[Value],
        receiver: Option<ObjectId>,
        require_static: bool,
        static_class: Option<ClassId>,
    ) -> Result<(NativeBody, Option<ObjectId>), MirrorError> {
        let tables = self.read();
        let entry = tables.method(method)?;
        tables.check_method_access(entry)?;
        if entry.descriptor.arity() != args.len() {
            return Err(MirrorError::ArityMismatch {
                expected: entry.descriptor.arity(),
                got: args.len(),
            });
        }
        let is_static = access::is_static(entry.access_flags);
        if require_static && !is_static {
            return Err(MirrorError::NotStatic {
                member: tables.member_display(entry.declaring, &entry.name),
            });
        }
        if let Some(class) = static_class {
            if !tables.is_subclass(class, entry.declaring)? {
                return Err(MirrorError::ReceiverMismatch {
                    receiver: tables.class_display(class),
                    declaring: tables.class_display(entry.declaring),
                });
            }
        }
        let bound = match receiver {
            // Statics dispatch receiverless even when called through an
            // instance, like `Method.invoke` with a bound receiver.
            Some(_) if is_static => None,
            Some(object) => {
                let class = tables.object(object)?.class;
                if !tables.is_subclass(class, entry.declaring)? {
                    return Err(MirrorError::ReceiverMismatch {
                        receiver: tables.class_display(class),
                        declaring: tables.class_display(entry.declaring),
                    });
                }
                Some(object)
            }
            None => None,
        };
        Ok((entry.body.clone(), bound))
    }
}

impl Default for HostMirror {
    fn default() -> Self {
        HostMirror::new()
    }
}

impl Mirror for HostMirror {
    fn class_by_name(&self, name: &str, loader: LoaderId) -> Result<ClassId, MirrorError> {
        let name = binary_name(name);
        let tables = self.read();
        if !tables.loaders.contains_key(&loader) {
            return Err(MirrorError::UnknownLoader(loader));
        }
        // Parent-first delegation: the chain is resolved to the root, then
        // probed from the root down toward the requesting loader.
        let mut chain = Vec::new();
        let mut current = Some(loader);
        while let Some(id) = current {
            chain.push(id);
            current = *tables
                .loaders
                .get(&id)
                .ok_or(MirrorError::UnknownLoader(id))?;
        }
        for &id in chain.iter().rev() {
            if let Some(&class) = tables.classes_by_name.get(&(id, name.clone())) {
                return Ok(class);
            }
        }
        Err(MirrorError::ClassNotFound { name, loader })
    }

    fn class_name(&self, class: ClassId) -> Result<String, MirrorError> {
        Ok(self.read().class(class)?.name.clone())
    }

    fn superclass(&self, class: ClassId) -> Result<Option<ClassId>, MirrorError> {
        Ok(self.read().class(class)?.superclass)
    }

    fn interfaces(&self, class: ClassId) -> Result<Vec<ClassId>, MirrorError> {
        Ok(self.read().class(class)?.interfaces.clone())
    }

    fn declared_fields(&self, class: ClassId) -> Result<Vec<FieldInfo>, MirrorError> {
        let tables = self.read();
        let entry = tables.class(class)?;
        entry
            .fields
            .iter()
            .map(|&id| {
                let field = tables.field(id)?;
                Ok(FieldInfo {
                    id,
                    name: field.name.clone(),
                    descriptor: field.descriptor.clone(),
                    access_flags: field.access_flags,
                })
            })
            .collect()
    }

    fn declared_methods(&self, class: ClassId) -> Result<Vec<MethodInfo>, MirrorError> {
        let tables = self.read();
        let entry = tables.class(class)?;
        entry
            .methods
            .iter()
            .map(|&id| {
                let method = tables.method(id)?;
                Ok(MethodInfo {
                    id,
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                    access_flags: method.access_flags,
                })
            })
            .collect()
    }

    fn declared_constructors(&self, class: ClassId) -> Result<Vec<MethodInfo>, MirrorError> {
        let tables = self.read();
        let entry = tables.class(class)?;
        entry
            .constructors
            .iter()
            .map(|&id| {
                let ctor = tables.method(id)?;
                Ok(MethodInfo {
                    id,
                    name: ctor.name.clone(),
                    descriptor: ctor.descriptor.clone(),
                    access_flags: ctor.access_flags,
                })
            })
            .collect()
    }

    fn object_class(&self, object: ObjectId) -> Result<ClassId, MirrorError> {
        Ok(self.read().object(object)?.class)
    }

    fn set_accessible(&self, member: MemberId) -> Result<(), MirrorError> {
        let tables = self.read();
        match member {
            MemberId::Field(id) => tables
                .field(id)?
                .accessible
                .store(true, Ordering::Release),
            MemberId::Method(id) => tables
                .method(id)?
                .accessible
                .store(true, Ordering::Release),
        }
        Ok(())
    }

    fn get_field(&self, object: ObjectId, field: FieldId) -> Result<Value, MirrorError> {
        let tables = self.read();
        let entry = tables.field(field)?;
        tables.check_field_access(entry)?;
        if access::is_static(entry.access_flags) {
            // Receiver is ignored for statics, `Field.get(obj)` style.
            return Ok(tables.statics.get(&field).cloned().unwrap_or(Value::Null));
        }
        let object_entry = tables.object(object)?;
        if !tables.is_subclass(object_entry.class, entry.declaring)? {
            return Err(MirrorError::ReceiverMismatch {
                receiver: tables.class_display(object_entry.class),
                declaring: tables.class_display(entry.declaring),
            });
        }
        Ok(object_entry
            .fields
            .get(&field)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn set_field(
        &self,
        object: ObjectId,
        field: FieldId,
        value: Value,
    ) -> Result<(), MirrorError> {
        let mut tables = self.write();
        let entry = tables.field(field)?;
        tables.check_field_access(entry)?;
        tables.check_store(entry, &value)?;
        let declaring = entry.declaring;
        if access::is_static(entry.access_flags) {
            tables.statics.insert(field, value);
            return Ok(());
        }
        let class = tables.object(object)?.class;
        if !tables.is_subclass(class, declaring)? {
            return Err(MirrorError::ReceiverMismatch {
                receiver: tables.class_display(class),
                declaring: tables.class_display(declaring),
            });
        }
        tables.object_mut(object)?.fields.insert(field, value);
        Ok(())
    }

    fn get_static(&self, class: ClassId, field: FieldId) -> Result<Value, MirrorError> {
        let tables = self.read();
        let entry = tables.field(field)?;
        tables.check_field_access(entry)?;
        if !access::is_static(entry.access_flags) {
            return Err(MirrorError::NotStatic {
                member: tables.member_display(entry.declaring, &entry.name),
            });
        }
        if !tables.is_subclass(class, entry.declaring)? {
            return Err(MirrorError::ReceiverMismatch {
                receiver: tables.class_display(class),
                declaring: tables.class_display(entry.declaring),
            });
        }
        Ok(tables.statics.get(&field).cloned().unwrap_or(Value::Null))
    }

    fn set_static(&self, class: ClassId, field: FieldId, value: Value) -> Result<(), MirrorError> {
        let mut tables = self.write();
        let entry = tables.field(field)?;
        tables.check_field_access(entry)?;
        if !access::is_static(entry.access_flags) {
            return Err(MirrorError::NotStatic {
                member: tables.member_display(entry.declaring, &entry.name),
            });
        }
        if !tables.is_subclass(class, entry.declaring)? {
            return Err(MirrorError::ReceiverMismatch {
                receiver: tables.class_display(class),
                declaring: tables.class_display(entry.declaring),
            });
        }
        tables.check_store(entry, &value)?;
        tables.statics.insert(field, value);
        Ok(())
    }

    fn invoke(
        &self,
        object: ObjectId,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, MirrorError> {
        let (body, receiver) = self.prepare_invoke(method, args, Some(object), false, None)?;
        body(self, receiver, args).map_err(MirrorError::Thrown)
    }

    fn invoke_static(
        &self,
        class: ClassId,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, MirrorError> {
        let (body, _) = self.prepare_invoke(method, args, None, true, Some(class))?;
        body(self, None, args).map_err(MirrorError::Thrown)
    }

    fn construct(
        &self,
        class: ClassId,
        ctor: MethodId,
        args: &[Value],
    ) -> Result<ObjectId, MirrorError> {
        let (body, object) = {
            let mut tables = self.write();
            let entry = tables.method(ctor)?;
            if entry.declaring != class || entry.name != "<init>" {
                return Err(MirrorError::NotConstructor(ctor));
            }
            tables.check_method_access(entry)?;
            if entry.descriptor.arity() != args.len() {
                return Err(MirrorError::ArityMismatch {
                    expected: entry.descriptor.arity(),
                    got: args.len(),
                });
            }
            let body = entry.body.clone();
            let fields = tables.instance_field_defaults(class)?;
            let object = self.mint();
            tables.objects.insert(
                object,
                ObjectEntry {
                    class,
                    fields,
                    attachments: HashMap::new(),
                },
            );
            (body, object)
        };
        match body(self, Some(object), args) {
            Ok(_) => Ok(object),
            Err(thrown) => {
                // A throwing constructor must not leak the allocation.
                self.write().objects.remove(&object);
                Err(MirrorError::Thrown(thrown))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::access::{ACC_PRIVATE, ACC_STATIC};

    fn field_id(host: &HostMirror, class: ClassId, name: &str) -> FieldId {
        host.declared_fields(class)
            .unwrap()
            .into_iter()
            .find(|f| f.name == name)
            .unwrap()
            .id
    }

    fn nop_body(
    ) -> impl Fn(&HostMirror, Option<ObjectId>, &[Value]) -> Result<Value, Thrown> + Send + Sync
    {
        |_, _, _| Ok(Value::Void)
    }

    fn point_class(host: &HostMirror) -> ClassId {
        let object = host
            .class_by_name("java.lang.Object", BOOTSTRAP_LOADER)
            .unwrap();
        host.register_class(
            ClassDef::new("fx.Point", BOOTSTRAP_LOADER, ACC_PUBLIC)
                .extends(object)
                .field(FieldDef::new("x", "I", ACC_PUBLIC))
                .field(FieldDef::new("y", "I", ACC_PUBLIC))
                .field(FieldDef::new("label", "Ljava/lang/Object;", ACC_PUBLIC))
                .field(FieldDef::new(
                    "origin_hits",
                    "J",
                    ACC_PUBLIC | ACC_STATIC,
                ))
                .constructor(ConstructorDef::new("(II)V", ACC_PUBLIC, {
                    move |host, this, args| {
                        let this = this.unwrap();
                        let class = host.object_class(this).unwrap();
                        let x = field_id(host, class, "x");
                        let y = field_id(host, class, "y");
                        host.set_field(this, x, args[0].clone()).unwrap();
                        host.set_field(this, y, args[1].clone()).unwrap();
                        Ok(Value::Void)
                    }
                }))
                .constructor(ConstructorDef::new("()V", ACC_PUBLIC, {
                    |_, _, _| {
                        Err(Thrown::new(
                            "java.lang.IllegalStateException",
                            "no default point",
                        ))
                    }
                })),
        )
        .unwrap()
    }

    fn make_point(host: &HostMirror, class: ClassId, x: i32, y: i32) -> ObjectId {
        let ctor = host
            .declared_constructors(class)
            .unwrap()
            .into_iter()
            .find(|c| c.descriptor.arity() == 2)
            .unwrap();
        host.construct(class, ctor.id, &[Value::Int(x), Value::Int(y)])
            .unwrap()
    }

    #[test]
    fn construct_initializes_then_runs_body() {
        let host = HostMirror::new();
        let class = point_class(&host);
        let point = make_point(&host, class, 3, 4);

        assert_eq!(
            host.get_field(point, field_id(&host, class, "x")).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            host.get_field(point, field_id(&host, class, "y")).unwrap(),
            Value::Int(4)
        );
        // Untouched fields carry JVM defaults.
        assert_eq!(
            host.get_field(point, field_id(&host, class, "label"))
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn throwing_constructor_rolls_back_the_allocation() {
        let host = HostMirror::new();
        let class = point_class(&host);
        let ctor = host
            .declared_constructors(class)
            .unwrap()
            .into_iter()
            .find(|c| c.descriptor.arity() == 0)
            .unwrap();

        let before = host.next_id.load(Ordering::Relaxed);
        let err = host.construct(class, ctor.id, &[]).unwrap_err();
        assert!(matches!(err, MirrorError::Thrown(_)));
        // The id minted for the rolled-back allocation must be dead.
        for id in before..host.next_id.load(Ordering::Relaxed) {
            assert!(matches!(
                host.object_class(id),
                Err(MirrorError::UnknownObject(_))
            ));
        }
    }

    #[test]
    fn statics_live_on_the_class_and_ignore_the_receiver() {
        let host = HostMirror::new();
        let class = point_class(&host);
        let hits = field_id(&host, class, "origin_hits");

        assert_eq!(host.get_static(class, hits).unwrap(), Value::Long(0));
        host.set_static(class, hits, Value::Long(7)).unwrap();
        assert_eq!(host.get_static(class, hits).unwrap(), Value::Long(7));

        // Instance-style access routes to the same slot.
        let point = make_point(&host, class, 0, 0);
        assert_eq!(host.get_field(point, hits).unwrap(), Value::Long(7));
        host.set_field(point, hits, Value::Long(8)).unwrap();
        assert_eq!(host.get_static(class, hits).unwrap(), Value::Long(8));

        // And the receiverless path rejects instance fields.
        let x = field_id(&host, class, "x");
        assert!(matches!(
            host.get_static(class, x),
            Err(MirrorError::NotStatic { .. })
        ));
    }

    #[test]
    fn incompatible_write_fails_at_storage_level() {
        let host = HostMirror::new();
        let class = point_class(&host);
        let point = make_point(&host, class, 1, 2);
        let x = field_id(&host, class, "x");

        let err = host.set_field(point, x, Value::Long(1)).unwrap_err();
        assert!(matches!(err, MirrorError::IncompatibleValue { .. }));
        // Reference slot typed Object takes a primitive through its wrapper.
        let label = field_id(&host, class, "label");
        host.set_field(point, label, Value::Int(9)).unwrap();
        assert_eq!(host.get_field(point, label).unwrap(), Value::Int(9));
    }

    #[test]
    fn non_public_members_need_the_override() {
        let host = HostMirror::new();
        let object = host
            .class_by_name("java.lang.Object", BOOTSTRAP_LOADER)
            .unwrap();
        let class = host
            .register_class(
                ClassDef::new("fx.Vault", BOOTSTRAP_LOADER, ACC_PUBLIC)
                    .extends(object)
                    .field(FieldDef::new("combo", "I", ACC_PRIVATE))
                    .constructor(ConstructorDef::new("()V", ACC_PUBLIC, nop_body())),
            )
            .unwrap();
        let ctor = host.declared_constructors(class).unwrap().remove(0);
        let vault = host.construct(class, ctor.id, &[]).unwrap();
        let combo = field_id(&host, class, "combo");

        assert!(matches!(
            host.get_field(vault, combo),
            Err(MirrorError::AccessDenied { .. })
        ));
        host.set_accessible(MemberId::Field(combo)).unwrap();
        // Idempotent; repeating the override is fine.
        host.set_accessible(MemberId::Field(combo)).unwrap();
        assert_eq!(host.get_field(vault, combo).unwrap(), Value::Int(0));
    }

    #[test]
    fn loaders_delegate_parent_first() {
        let host = HostMirror::new();
        let child = host.register_loader(BOOTSTRAP_LOADER).unwrap();
        let grandchild = host.register_loader(child).unwrap();
        let object = host
            .class_by_name("java.lang.Object", BOOTSTRAP_LOADER)
            .unwrap();
        let in_child = host
            .register_class(
                ClassDef::new("app.Plugin", child, ACC_PUBLIC).extends(object),
            )
            .unwrap();

        // Bootstrap classes are visible everywhere below.
        assert_eq!(
            host.class_by_name("java.lang.Object", grandchild).unwrap(),
            object
        );
        // Child classes are visible from descendants, not ancestors.
        assert_eq!(host.class_by_name("app.Plugin", grandchild).unwrap(), in_child);
        assert!(matches!(
            host.class_by_name("app.Plugin", BOOTSTRAP_LOADER),
            Err(MirrorError::ClassNotFound { .. })
        ));
        // A sibling loader defines the same name independently.
        let sibling = host.register_loader(BOOTSTRAP_LOADER).unwrap();
        let in_sibling = host
            .register_class(
                ClassDef::new("app.Plugin", sibling, ACC_PUBLIC).extends(object),
            )
            .unwrap();
        assert_ne!(in_child, in_sibling);
    }

    #[test]
    fn registration_validates_before_storing() {
        let host = HostMirror::new();
        let object = host
            .class_by_name("java.lang.Object", BOOTSTRAP_LOADER)
            .unwrap();

        assert!(matches!(
            host.register_class(ClassDef::new("fx.Nowhere", 999, ACC_PUBLIC)),
            Err(MirrorError::UnknownLoader(999))
        ));
        assert!(matches!(
            host.register_class(ClassDef::new("java.lang.Object", BOOTSTRAP_LOADER, ACC_PUBLIC)),
            Err(MirrorError::DuplicateClass(_))
        ));
        assert!(matches!(
            host.register_class(
                ClassDef::new("fx.Bad", BOOTSTRAP_LOADER, ACC_PUBLIC)
                    .extends(object)
                    .field(FieldDef::new("x", "Q", ACC_PUBLIC)),
            ),
            Err(MirrorError::InvalidDescriptor(_))
        ));
        // Constructors must return void.
        assert!(matches!(
            host.register_class(
                ClassDef::new("fx.Bad", BOOTSTRAP_LOADER, ACC_PUBLIC)
                    .extends(object)
                    .constructor(ConstructorDef::new("()I", ACC_PUBLIC, nop_body())),
            ),
            Err(MirrorError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            host.register_class(
                ClassDef::new("fx.Bad", BOOTSTRAP_LOADER, ACC_PUBLIC)
                    .extends(object)
                    .field(FieldDef::new("x", "I", ACC_PUBLIC))
                    .field(FieldDef::new("x", "J", ACC_PUBLIC)),
            ),
            Err(MirrorError::DuplicateMember { .. })
        ));
        // A failed registration leaves no trace.
        assert!(matches!(
            host.class_by_name("fx.Bad", BOOTSTRAP_LOADER),
            Err(MirrorError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn attachments_follow_the_object_lifetime() {
        let host = HostMirror::new();
        let class = point_class(&host);
        let point = make_point(&host, class, 1, 1);

        assert_eq!(host.attachment(point, "note").unwrap(), None);
        host.set_attachment(point, "note", Value::Int(42)).unwrap();
        assert_eq!(host.attachment(point, "note").unwrap(), Some(Value::Int(42)));
        assert_eq!(
            host.take_attachment(point, "note").unwrap(),
            Some(Value::Int(42))
        );
        assert_eq!(host.attachment(point, "note").unwrap(), None);

        host.set_attachment(point, "note", Value::Int(1)).unwrap();
        host.collect_object(point).unwrap();
        assert!(matches!(
            host.attachment(point, "note"),
            Err(MirrorError::UnknownObject(_))
        ));
        assert!(matches!(
            host.object_class(point),
            Err(MirrorError::UnknownObject(_))
        ));
    }
}
