//! Node properties: typed, validated configuration values.
//!
//! A node type builds its `PropertySet` once at construction. Each property
//! carries its initial value, an optional validator that can veto a new value,
//! and an optional observer that runs after a successful set.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::PropertyId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind tag of a `PropertyValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Bool,
    Int,
    Double,
    Enum,
    Matrix,
    Filepath,
    String,
}

/// Row-major 3x3 matrix, used for convolution kernels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Matrix3x3(pub [f64; 9]);

impl Matrix3x3 {
    /// Matrix with only the center element set.
    pub fn centered(center: f64) -> Self {
        let mut v = [0.0; 9];
        v[4] = center;
        Self(v)
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.0[row * 3 + col]
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Index into a property's list of enum options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumValue(pub i32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Double(f64),
    Enum(EnumValue),
    Matrix(Matrix3x3),
    Filepath(PathBuf),
    String(String),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Enum(_) => PropertyType::Enum,
            PropertyValue::Matrix(_) => PropertyType::Matrix,
            PropertyValue::Filepath(_) => PropertyType::Filepath,
            PropertyValue::String(_) => PropertyType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumValue> {
        match self {
            PropertyValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix3x3> {
        match self {
            PropertyValue::Matrix(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_filepath(&self) -> Option<&PathBuf> {
        match self {
            PropertyValue::Filepath(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<EnumValue> for PropertyValue {
    fn from(v: EnumValue) -> Self {
        PropertyValue::Enum(v)
    }
}

impl From<Matrix3x3> for PropertyValue {
    fn from(v: Matrix3x3) -> Self {
        PropertyValue::Matrix(v)
    }
}

impl From<PathBuf> for PropertyValue {
    fn from(v: PathBuf) -> Self {
        PropertyValue::Filepath(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

/// Veto check run before a new value is stored.
pub trait PropertyValidator: Send {
    fn validate(&self, value: &PropertyValue) -> bool;
}

/// Numeric property kinds that range validators can bound.
pub trait Bound: PartialOrd + Copy + Send + 'static {
    fn extract(value: &PropertyValue) -> Option<Self>;
}

impl Bound for i32 {
    fn extract(value: &PropertyValue) -> Option<Self> {
        value.as_int()
    }
}

impl Bound for f64 {
    fn extract(value: &PropertyValue) -> Option<Self> {
        value.as_double()
    }
}

impl Bound for EnumValue {
    fn extract(value: &PropertyValue) -> Option<Self> {
        value.as_enum()
    }
}

/// Accepts `min <= v <= max`.
pub struct InclusiveRange<T: Bound> {
    pub min: T,
    pub max: T,
}

impl<T: Bound> PropertyValidator for InclusiveRange<T> {
    fn validate(&self, value: &PropertyValue) -> bool {
        T::extract(value).is_some_and(|v| v >= self.min && v <= self.max)
    }
}

/// Accepts `min < v < max`.
pub struct ExclusiveRange<T: Bound> {
    pub min: T,
    pub max: T,
}

impl<T: Bound> PropertyValidator for ExclusiveRange<T> {
    fn validate(&self, value: &PropertyValue) -> bool {
        T::extract(value).is_some_and(|v| v > self.min && v < self.max)
    }
}

/// Accepts `v >= min`.
pub struct MinValue<T: Bound>(pub T);

impl<T: Bound> PropertyValidator for MinValue<T> {
    fn validate(&self, value: &PropertyValue) -> bool {
        T::extract(value).is_some_and(|v| v >= self.0)
    }
}

/// Accepts `v <= max`.
pub struct MaxValue<T: Bound>(pub T);

impl<T: Bound> PropertyValidator for MaxValue<T> {
    fn validate(&self, value: &PropertyValue) -> bool {
        T::extract(value).is_some_and(|v| v <= self.0)
    }
}

/// Arbitrary closure validator.
pub struct FnValidator<F>(pub F);

impl<F> PropertyValidator for FnValidator<F>
where
    F: Fn(&PropertyValue) -> bool + Send,
{
    fn validate(&self, value: &PropertyValue) -> bool {
        (self.0)(value)
    }
}

/// Callback run after a value has been accepted and stored.
pub type PropertyObserver = Box<dyn Fn(&PropertyValue) + Send>;

/// Declared shape of one property, as exposed through `NodeConfig`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyConfig {
    pub name: String,
    pub property_type: PropertyType,
    pub initial: PropertyValue,
    /// Free-form hints for an editor, e.g. `"min:1, max:20, step:2"`.
    pub ui_hints: String,
    /// Option names of an enum property, indexed by `EnumValue`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_options: Vec<String>,
}

pub struct NodeProperty {
    name: String,
    initial: PropertyValue,
    value: PropertyValue,
    ui_hints: String,
    enum_options: Vec<String>,
    validator: Option<Box<dyn PropertyValidator>>,
    observer: Option<PropertyObserver>,
}

impl NodeProperty {
    fn new(name: impl Into<String>, initial: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value: initial.clone(),
            initial,
            ui_hints: String::new(),
            enum_options: Vec::new(),
            validator: None,
            observer: None,
        }
    }

    pub fn set_validator(&mut self, validator: impl PropertyValidator + 'static) -> &mut Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn set_observer(&mut self, observer: impl Fn(&PropertyValue) + Send + 'static) -> &mut Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_ui_hints(&mut self, hints: impl Into<String>) -> &mut Self {
        self.ui_hints = hints.into();
        self
    }

    /// Name the options of an enum property. A non-empty list also limits
    /// accepted values to its indices.
    pub fn set_enum_options<S: Into<String>>(&mut self, options: impl IntoIterator<Item = S>) -> &mut Self {
        self.enum_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enum_options(&self) -> &[String] {
        &self.enum_options
    }

    /// Name of the currently selected option.
    pub fn enum_option_name(&self) -> Option<&str> {
        let index = usize::try_from(self.value.as_enum()?.0).ok()?;
        self.enum_options.get(index).map(String::as_str)
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn property_type(&self) -> PropertyType {
        self.initial.property_type()
    }

    pub fn config(&self) -> PropertyConfig {
        PropertyConfig {
            name: self.name.clone(),
            property_type: self.property_type(),
            initial: self.initial.clone(),
            ui_hints: self.ui_hints.clone(),
            enum_options: self.enum_options.clone(),
        }
    }

    fn accepts(&self, value: &PropertyValue) -> bool {
        let in_options = match (value.as_enum(), self.enum_options.len()) {
            (Some(EnumValue(index)), len) if len > 0 => {
                usize::try_from(index).is_ok_and(|i| i < len)
            }
            _ => true,
        };
        in_options && self.validator.as_ref().map_or(true, |v| v.validate(value))
    }
}

impl std::fmt::Debug for NodeProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeProperty")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("has_validator", &self.validator.is_some())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

/// Ordered list of a node's properties; `PropertyId` is the position.
#[derive(Debug, Default)]
pub struct PropertySet {
    props: Vec<NodeProperty>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a property and return it for chained validator/observer setup.
    pub fn add(&mut self, name: impl Into<String>, initial: impl Into<PropertyValue>) -> &mut NodeProperty {
        self.props.push(NodeProperty::new(name, initial.into()));
        let last = self.props.len() - 1;
        &mut self.props[last]
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeProperty> {
        self.props.iter()
    }

    pub fn find(&self, name: &str) -> Option<PropertyId> {
        self.props
            .iter()
            .position(|p| p.name == name)
            .and_then(PropertyId::from_index)
    }

    /// Validate and store a new value, then notify the observer.
    ///
    /// On any error the stored value is left untouched.
    pub fn set(&mut self, id: PropertyId, value: PropertyValue) -> PipelineResult<()> {
        let prop = self
            .props
            .get_mut(id.index())
            .ok_or(PipelineError::PropertyNotFound(id))?;

        if value.property_type() != prop.property_type() {
            return Err(PipelineError::PropertyTypeMismatch(id));
        }
        if !prop.accepts(&value) {
            return Err(PipelineError::PropertyRejected(id));
        }

        prop.value = value;
        if let Some(observer) = &prop.observer {
            observer(&prop.value);
        }
        Ok(())
    }

    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.props.get(id.index()).map(|p| &p.value)
    }

    pub fn get_bool(&self, id: PropertyId) -> Option<bool> {
        self.get(id).and_then(PropertyValue::as_bool)
    }

    pub fn get_int(&self, id: PropertyId) -> Option<i32> {
        self.get(id).and_then(PropertyValue::as_int)
    }

    pub fn get_double(&self, id: PropertyId) -> Option<f64> {
        self.get(id).and_then(PropertyValue::as_double)
    }

    pub fn get_enum(&self, id: PropertyId) -> Option<EnumValue> {
        self.get(id).and_then(PropertyValue::as_enum)
    }

    pub fn get_matrix(&self, id: PropertyId) -> Option<Matrix3x3> {
        self.get(id).and_then(PropertyValue::as_matrix).copied()
    }

    pub fn configs(&self) -> Vec<PropertyConfig> {
        self.props.iter().map(NodeProperty::config).collect()
    }
}
